//! Invoice data models for Lithuanian invoice extraction.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The fields the engine knows how to extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    InvoiceId,
    Date,
    CompanyName,
    AmountWithoutVat,
    VatAmount,
    VatRate,
    VatNumber,
    CompanyNumber,
}

impl FieldKey {
    /// All extractable fields, in output order.
    pub const ALL: [FieldKey; 8] = [
        FieldKey::InvoiceId,
        FieldKey::Date,
        FieldKey::CompanyName,
        FieldKey::AmountWithoutVat,
        FieldKey::VatAmount,
        FieldKey::VatRate,
        FieldKey::VatNumber,
        FieldKey::CompanyNumber,
    ];

    /// Stable snake_case name, matching the serialized form.
    pub fn name(self) -> &'static str {
        match self {
            FieldKey::InvoiceId => "invoice_id",
            FieldKey::Date => "date",
            FieldKey::CompanyName => "company_name",
            FieldKey::AmountWithoutVat => "amount_without_vat",
            FieldKey::VatAmount => "vat_amount",
            FieldKey::VatRate => "vat_rate",
            FieldKey::VatNumber => "vat_number",
            FieldKey::CompanyNumber => "company_number",
        }
    }
}

/// Whether the document is a sales or purchase invoice from the
/// user's point of view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// The user is the seller; the counterparty is the buyer.
    Sale,
    /// The user is the buyer; the counterparty is the seller.
    Purchase,
    #[default]
    Unknown,
}

/// Buyer or seller section of the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Buyer,
    Seller,
}

impl Direction {
    /// The document section that describes the counterparty.
    ///
    /// For an unknown direction the buyer section is assumed.
    pub fn partner_section(self) -> Section {
        match self {
            Direction::Sale => Section::Buyer,
            Direction::Purchase => Section::Seller,
            Direction::Unknown => Section::Buyer,
        }
    }

    /// The section that describes the user's own company, when known.
    pub fn own_section(self) -> Option<Section> {
        match self {
            Direction::Sale => Some(Section::Seller),
            Direction::Purchase => Some(Section::Buyer),
            Direction::Unknown => None,
        }
    }
}

/// Lithuanian VAT rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VatRate {
    /// Standard rate: 21%
    #[serde(rename = "21")]
    Standard21,

    /// Reduced rate: 9%
    #[serde(rename = "9")]
    Reduced9,

    /// Reduced rate: 5%
    #[serde(rename = "5")]
    Reduced5,

    /// Zero rate: 0%
    #[serde(rename = "0")]
    Zero,
}

impl VatRate {
    /// All rates, highest first. Cross-validation checks them in this order.
    pub const ALL: [VatRate; 4] = [
        VatRate::Standard21,
        VatRate::Reduced9,
        VatRate::Reduced5,
        VatRate::Zero,
    ];

    /// The rate as a decimal multiplier (e.g. 0.21 for 21%).
    pub fn as_decimal(&self) -> Decimal {
        match self {
            VatRate::Standard21 => Decimal::new(21, 2),
            VatRate::Reduced9 => Decimal::new(9, 2),
            VatRate::Reduced5 => Decimal::new(5, 2),
            VatRate::Zero => Decimal::ZERO,
        }
    }

    /// The rate as an integer percentage.
    pub fn percent(&self) -> u8 {
        match self {
            VatRate::Standard21 => 21,
            VatRate::Reduced9 => 9,
            VatRate::Reduced5 => 5,
            VatRate::Zero => 0,
        }
    }

    /// Parse a rate from an integer percentage.
    pub fn from_percent(percent: u8) -> Option<Self> {
        match percent {
            21 => Some(VatRate::Standard21),
            9 => Some(VatRate::Reduced9),
            5 => Some(VatRate::Reduced5),
            0 => Some(VatRate::Zero),
            _ => None,
        }
    }

    /// Parse a rate from a string like "21", "21%" or "21 %".
    pub fn from_str(s: &str) -> Option<Self> {
        let s = s.trim().trim_end_matches('%').trim();
        s.parse::<u8>().ok().and_then(Self::from_percent)
    }

    /// Format for display.
    pub fn display(&self) -> String {
        format!("{}%", self.percent())
    }
}

/// The caller's own company identifiers, excluded from every extracted
/// counterparty field. Supplied per invocation; never persisted here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OwnCompanyIdentity {
    /// Company registration number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_number: Option<String>,

    /// VAT payer code (LT prefix).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vat_number: Option<String>,

    /// Registered company name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl OwnCompanyIdentity {
    pub fn new(
        company_number: Option<String>,
        vat_number: Option<String>,
        name: Option<String>,
    ) -> Self {
        Self {
            company_number,
            vat_number,
            name,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.company_number.is_none() && self.vat_number.is_none() && self.name.is_none()
    }
}

/// Structured result of extracting one invoice document.
///
/// Every field is optional; absence is the normal outcome of
/// low-information input, not an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedInvoice {
    /// Invoice identifier (series + number when printed separately).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_id: Option<String>,

    /// Issue date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,

    /// Counterparty company name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,

    /// Net amount, normalized to a dot-decimal string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_without_vat: Option<String>,

    /// VAT amount, normalized to a dot-decimal string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vat_amount: Option<String>,

    /// VAT rate as an integer percentage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vat_rate: Option<VatRate>,

    /// Counterparty VAT payer code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vat_number: Option<String>,

    /// Counterparty company registration number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_number: Option<String>,

    /// The full input line sequence, retained for re-parsing and debugging.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lines: Vec<String>,

    /// Human-readable explanation when no usable text was obtained.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

impl ExtractedInvoice {
    /// Create a result carrying only the input lines.
    pub fn with_lines(lines: Vec<String>) -> Self {
        Self {
            lines,
            ..Self::default()
        }
    }

    /// Whether the given field holds a usable value.
    pub fn has(&self, key: FieldKey) -> bool {
        match key {
            FieldKey::InvoiceId => !blank(&self.invoice_id),
            FieldKey::Date => self.date.is_some(),
            FieldKey::CompanyName => !blank(&self.company_name),
            FieldKey::AmountWithoutVat => !blank(&self.amount_without_vat),
            FieldKey::VatAmount => !blank(&self.vat_amount),
            FieldKey::VatRate => self.vat_rate.is_some(),
            FieldKey::VatNumber => !blank(&self.vat_number),
            FieldKey::CompanyNumber => !blank(&self.company_number),
        }
    }

    /// Whether no field holds a usable value.
    pub fn is_empty(&self) -> bool {
        FieldKey::ALL.iter().all(|k| !self.has(*k))
    }

    /// Fields that could not be extracted.
    pub fn missing_fields(&self) -> Vec<FieldKey> {
        FieldKey::ALL.iter().copied().filter(|k| !self.has(*k)).collect()
    }

    /// Copy the given field from another result when it is blank here.
    pub fn fill_from(&mut self, key: FieldKey, other: &Self) {
        if self.has(key) || !other.has(key) {
            return;
        }
        match key {
            FieldKey::InvoiceId => self.invoice_id = other.invoice_id.clone(),
            FieldKey::Date => self.date = other.date,
            FieldKey::CompanyName => self.company_name = other.company_name.clone(),
            FieldKey::AmountWithoutVat => {
                self.amount_without_vat = other.amount_without_vat.clone()
            }
            FieldKey::VatAmount => self.vat_amount = other.vat_amount.clone(),
            FieldKey::VatRate => self.vat_rate = other.vat_rate,
            FieldKey::VatNumber => self.vat_number = other.vat_number.clone(),
            FieldKey::CompanyNumber => self.company_number = other.company_number.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vat_rate_parsing() {
        assert_eq!(VatRate::from_str("21%"), Some(VatRate::Standard21));
        assert_eq!(VatRate::from_str("21 %"), Some(VatRate::Standard21));
        assert_eq!(VatRate::from_str("21"), Some(VatRate::Standard21));
        assert_eq!(VatRate::from_str("9"), Some(VatRate::Reduced9));
        assert_eq!(VatRate::from_str("0"), Some(VatRate::Zero));
        assert_eq!(VatRate::from_str("23"), None);
    }

    #[test]
    fn test_vat_rate_decimal() {
        assert_eq!(VatRate::Standard21.as_decimal(), Decimal::new(21, 2));
        assert_eq!(VatRate::Zero.as_decimal(), Decimal::ZERO);
    }

    #[test]
    fn test_partner_section() {
        assert_eq!(Direction::Sale.partner_section(), Section::Buyer);
        assert_eq!(Direction::Purchase.partner_section(), Section::Seller);
        assert_eq!(Direction::Unknown.partner_section(), Section::Buyer);
        assert_eq!(Direction::Unknown.own_section(), None);
    }

    #[test]
    fn test_missing_fields() {
        let mut inv = ExtractedInvoice::default();
        assert!(inv.is_empty());
        assert_eq!(inv.missing_fields().len(), 8);

        inv.invoice_id = Some("ABC123".to_string());
        inv.vat_amount = Some("  ".to_string());
        assert!(inv.has(FieldKey::InvoiceId));
        assert!(!inv.has(FieldKey::VatAmount));
    }

    #[test]
    fn test_fill_from() {
        let mut a = ExtractedInvoice::default();
        let b = ExtractedInvoice {
            company_name: Some("UAB Pavyzdys".to_string()),
            ..Default::default()
        };
        a.fill_from(FieldKey::CompanyName, &b);
        assert_eq!(a.company_name.as_deref(), Some("UAB Pavyzdys"));
    }
}
