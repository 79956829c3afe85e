//! Multi-pass heuristic parser turning OCR text lines into a structured
//! invoice.
//!
//! The passes run in a fixed order and each pass only fills fields that
//! are still unset. Every site that produces a counterparty identifier
//! checks it against the caller's own company identity.

use std::str::FromStr;

use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::models::invoice::{
    Direction, ExtractedInvoice, FieldKey, OwnCompanyIdentity, Section, VatRate,
};

use super::identity;
use super::rules::{amounts, company, dates, keywords, patterns, vat};
use super::validate::validate_field;

/// A company-number candidate found after a "kodas" label.
#[derive(Debug, Clone)]
struct CodeCandidate {
    value: String,
    line: usize,
    section: Option<Section>,
}

/// Heuristic invoice parser for Lithuanian OCR text.
pub struct HeuristicParser {
    own: OwnCompanyIdentity,
    direction: Direction,
    max_name_len: usize,
}

impl HeuristicParser {
    pub fn new() -> Self {
        Self {
            own: OwnCompanyIdentity::default(),
            direction: Direction::Unknown,
            max_name_len: 150,
        }
    }

    /// Set the own-company identifiers to exclude from every field.
    pub fn with_own_identity(mut self, own: OwnCompanyIdentity) -> Self {
        self.own = own;
        self
    }

    /// Set the invoice direction.
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Set the company-name length ceiling.
    pub fn with_max_name_len(mut self, max: usize) -> Self {
        self.max_name_len = max;
        self
    }

    /// Run every pass over the lines and produce a structured result.
    pub fn parse(&self, lines: &[String]) -> ExtractedInvoice {
        let mut inv = ExtractedInvoice::with_lines(lines.to_vec());

        if lines.iter().all(|l| l.trim().is_empty()) {
            inv.message = Some("no text could be recognized in the document".to_string());
            return inv;
        }

        info!(lines = lines.len(), direction = ?self.direction, "parsing invoice text");

        let vat_line = self.vat_pre_pass(lines, &mut inv);
        self.company_code_pre_pass(lines, &mut inv);
        self.label_pass(lines, &mut inv);
        self.company_near_vat(lines, vat_line, &mut inv);

        self.fallback_date(lines, &mut inv);
        self.fallback_invoice_id(lines, &mut inv);
        self.fallback_company_name(lines, &mut inv);
        self.fallback_amounts(lines, &mut inv);

        self.cross_validate_vat(lines, &mut inv);

        // Final own-company re-check on whatever name survived.
        if let Some(name) = &inv.company_name {
            if identity::is_own_company(name, &self.own) {
                debug!("dropping company name matching the own company");
                inv.company_name = None;
            }
        }

        debug!(missing = ?inv.missing_fields(), "parse finished");
        inv
    }

    /// Pass 1: find the counterparty VAT code anywhere in the document.
    fn vat_pre_pass(&self, lines: &[String], inv: &mut ExtractedInvoice) -> Option<usize> {
        for (i, line) in lines.iter().enumerate() {
            if let Some(code) = vat::extract_vat_number(line, self.own.vat_number.as_deref()) {
                debug!(line = i, "found VAT code");
                inv.vat_number = Some(code);
                return Some(i);
            }
            // Label-keyed fallback: the value must still carry the LT prefix.
            if keywords::normalize_key(line) == Some(FieldKey::VatNumber) {
                if let Some(value) = value_after_colon(line) {
                    let cleaned: String = value
                        .chars()
                        .filter(|c| c.is_alphanumeric())
                        .collect::<String>()
                        .to_uppercase();
                    let own_vat = self.own.vat_number.as_deref().map(vat::normalize_id);
                    if cleaned.starts_with("LT")
                        && validate_field(FieldKey::VatNumber, &cleaned)
                        && own_vat.as_deref() != Some(cleaned.as_str())
                    {
                        debug!(line = i, "found labeled VAT code");
                        inv.vat_number = Some(cleaned);
                        return Some(i);
                    }
                }
            }
        }
        None
    }

    /// Pass 2: company number after a "kodas" label, selected by direction
    /// and buyer/seller section tags, with a label-free fallback pool.
    fn company_code_pre_pass(&self, lines: &[String], inv: &mut ExtractedInvoice) {
        if inv.has(FieldKey::CompanyNumber) {
            return;
        }

        let mut candidates: Vec<CodeCandidate> = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            let Some(pos) = keywords::has_company_code_label(line) else {
                continue;
            };
            let tail = line.get(pos..).unwrap_or(line.as_str());
            let mut found = company::company_number_candidates(tail);
            if found.is_empty() && i + 1 < lines.len() {
                // Label with the value on the following line.
                found = company::company_number_candidates(&lines[i + 1]);
            }
            if let Some(value) = found.into_iter().next() {
                candidates.push(CodeCandidate {
                    value,
                    line: i,
                    section: self.section_near(lines, i, 10),
                });
            }
        }

        // A labeled candidate that the selection rules discarded must not
        // resurface through the label-free pool.
        if !candidates.is_empty() {
            if let Some(code) = self.select_code_candidate(&candidates) {
                debug!(code = %code, "selected company number after code label");
                inv.company_number = Some(code);
            }
            return;
        }

        // Fallback pool: every company-number-shaped match anywhere.
        let vat_code = inv.vat_number.clone();
        let mut pool: Vec<CodeCandidate> = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            for m in patterns::COMPANY_CODE.find_iter(line) {
                let code = m.as_str().to_string();
                if company::is_excluded(
                    &code,
                    vat_code.as_deref(),
                    self.own.company_number.as_deref(),
                ) {
                    continue;
                }
                // Numbers right after invoice-number text are not codes.
                let prefix = line[..m.start()].to_lowercase();
                let prefix_tail: String =
                    prefix.chars().rev().take(12).collect::<String>().chars().rev().collect();
                if prefix_tail.contains("nr") || prefix_tail.contains("serija") {
                    continue;
                }
                pool.push(CodeCandidate {
                    value: code,
                    line: i,
                    section: self.section_near(lines, i, 3),
                });
            }
        }

        let fallback = pool
            .iter()
            .find(|c| c.section.is_some())
            .or_else(|| pool.first());
        if let Some(c) = fallback {
            debug!(code = %c.value, line = c.line, "company number from fallback pool");
            inv.company_number = Some(c.value.clone());
        }
    }

    /// Direction-dependent choice among keyword-anchored candidates.
    fn select_code_candidate(&self, candidates: &[CodeCandidate]) -> Option<String> {
        if let Some(own_code) = self.own.company_number.as_deref() {
            let own_norm = vat::normalize_id(own_code);
            let remaining: Vec<&CodeCandidate> = candidates
                .iter()
                .filter(|c| c.value != own_norm)
                .collect();
            let preferred = self.direction.partner_section();
            return remaining
                .iter()
                .find(|c| c.section == Some(preferred))
                .or_else(|| remaining.first())
                .map(|c| c.value.clone());
        }

        match candidates {
            [] => None,
            [only] => {
                // A single candidate is used unless it sits in the section
                // that belongs to the user's own side.
                let own_side = self.direction.own_section();
                (own_side.is_none() || only.section != own_side).then(|| only.value.clone())
            }
            many => {
                // Seller details are conventionally listed first.
                let pick = match self.direction {
                    Direction::Purchase | Direction::Unknown => many.first(),
                    Direction::Sale => many.last(),
                };
                pick.map(|c| c.value.clone())
            }
        }
    }

    /// Nearest buyer/seller section keyword within the window.
    fn section_near(&self, lines: &[String], i: usize, window: usize) -> Option<Section> {
        for offset in 0..=window {
            if let Some(idx) = i.checked_sub(offset) {
                if let Some(sec) = keywords::line_section(&lines[idx]) {
                    return Some(sec);
                }
            }
            let idx = i + offset;
            if offset > 0 && idx < lines.len() {
                if let Some(sec) = keywords::line_section(&lines[idx]) {
                    return Some(sec);
                }
            }
        }
        None
    }

    /// Pass 3: resolve each line's label and dispatch to the extractor.
    fn label_pass(&self, lines: &[String], inv: &mut ExtractedInvoice) {
        for (i, line) in lines.iter().enumerate() {
            let Some(key) = keywords::normalize_key(line) else {
                continue;
            };
            if inv.has(key) {
                continue;
            }
            match key {
                FieldKey::InvoiceId => {
                    inv.invoice_id = self
                        .combine_series_number(lines, i)
                        .or_else(|| invoice_id_after_colon(line));
                }
                FieldKey::Date => inv.date = dates::extract_date(line),
                FieldKey::AmountWithoutVat => {
                    inv.amount_without_vat = amounts::extract_amount_normalized(line);
                }
                FieldKey::VatAmount => {
                    inv.vat_amount = amounts::extract_amount_normalized(line);
                }
                FieldKey::VatNumber => {
                    inv.vat_number =
                        vat::extract_vat_number(line, self.own.vat_number.as_deref());
                }
                FieldKey::CompanyNumber => {
                    // "kodas"-labeled lines were already judged by the
                    // pre-pass; only the short label forms reach this arm.
                    if keywords::has_company_code_label(line).is_none() {
                        inv.company_number = company::extract_company_number(
                            line,
                            inv.vat_number.as_deref(),
                            self.own.company_number.as_deref(),
                        );
                    }
                }
                FieldKey::CompanyName => {
                    inv.company_name = self.company_name_from(lines, i);
                }
                FieldKey::VatRate => {}
            }
        }
    }

    /// Company name from a section label line: either a same-line
    /// `label: value` split or a short forward search for the first line
    /// that is not a label and carries a legal-form token.
    fn company_name_from(&self, lines: &[String], i: usize) -> Option<String> {
        let line = &lines[i];
        if keywords::is_section_label(line) {
            return self.name_from_window(lines, i);
        }
        let value = value_after_colon(line)?;
        self.name_candidate(value)
    }

    fn name_from_window(&self, lines: &[String], i: usize) -> Option<String> {
        let hi = (i + 5).min(lines.len().saturating_sub(1));
        for line in lines.iter().take(hi + 1).skip(i + 1) {
            if keywords::is_section_label(line) || keywords::normalize_key(line).is_some() {
                continue;
            }
            if !keywords::has_legal_form(line) {
                continue;
            }
            if let Some(name) = self.name_candidate(line) {
                return Some(name);
            }
        }
        None
    }

    /// Apply the rejection rules to a name candidate; tries the part
    /// before the first comma when it carries the legal form.
    fn name_candidate(&self, text: &str) -> Option<String> {
        if let Some((head, _)) = text.split_once(',') {
            if keywords::has_legal_form(head) {
                if let Some(name) = self.accept_name(head) {
                    return Some(name);
                }
            }
        }
        self.accept_name(text)
    }

    fn accept_name(&self, cand: &str) -> Option<String> {
        let cand = cand
            .trim()
            .trim_matches(|c: char| c == ',' || c == ';')
            .trim();
        let len = cand.chars().count();
        if len < 5 || len > self.max_name_len {
            return None;
        }
        if keywords::is_section_label(cand) {
            return None;
        }
        let lower = cand.to_lowercase();
        if keywords::INVOICE_VOCAB.iter().any(|w| lower.contains(w)) {
            return None;
        }
        if keywords::is_amount_in_words(cand) {
            return None;
        }
        if !keywords::has_legal_form(cand) {
            return None;
        }
        if identity::is_own_company(cand, &self.own) {
            return None;
        }
        Some(cand.to_string())
    }

    /// Pass 4: counterparty identifiers cluster, so re-search a window
    /// around the VAT code's line for a company number.
    fn company_near_vat(
        &self,
        lines: &[String],
        vat_line: Option<usize>,
        inv: &mut ExtractedInvoice,
    ) {
        if inv.has(FieldKey::CompanyNumber) || !inv.has(FieldKey::VatNumber) {
            return;
        }
        let Some(v) = vat_line else { return };
        for offset in 0..=5usize {
            let below = v + offset;
            let idxs = [v.checked_sub(offset), (below < lines.len()).then_some(below)];
            for idx in idxs.into_iter().flatten() {
                if let Some(code) = company::extract_company_number(
                    &lines[idx],
                    inv.vat_number.as_deref(),
                    self.own.company_number.as_deref(),
                ) {
                    debug!(line = idx, "company number near VAT code");
                    inv.company_number = Some(code);
                    return;
                }
            }
        }
    }

    fn fallback_date(&self, lines: &[String], inv: &mut ExtractedInvoice) {
        if inv.has(FieldKey::Date) {
            return;
        }
        inv.date = lines.iter().find_map(|l| dates::extract_date(l));
    }

    fn fallback_invoice_id(&self, lines: &[String], inv: &mut ExtractedInvoice) {
        if inv.has(FieldKey::InvoiceId) {
            return;
        }
        for i in 0..lines.len() {
            if let Some(id) = self.combine_series_number(lines, i) {
                inv.invoice_id = Some(id);
                return;
            }
        }
        for line in lines {
            if let Some(caps) = patterns::INVOICE_NO_FALLBACK.captures(line) {
                let token = &caps[1];
                if token.chars().any(|c| c.is_ascii_alphabetic()) {
                    inv.invoice_id = Some(token.to_string());
                    return;
                }
            }
        }
    }

    /// The local convention prints a short "series" token and a numeric
    /// "number" token as two fields that together form the invoice id.
    fn combine_series_number(&self, lines: &[String], i: usize) -> Option<String> {
        let line = &lines[i];
        let label = patterns::SERIES_LABEL.find(line)?;
        let after = line.get(label.end()..)?;

        let (series_start, series) = patterns::SERIES_TOKEN
            .captures_iter(after)
            .filter_map(|c| c.get(1).map(|m| (m.start(), m.as_str().to_string())))
            .filter(|(start, _)| *start <= 50)
            .find(|(_, tok)| is_series_token(tok))?;

        let rest = after.get(series_start + series.len()..).unwrap_or("");
        if let Some(number) = find_number_token(rest, true) {
            return Some(format!("{}{}", series, number));
        }
        for j in (i + 1)..lines.len().min(i + 3) {
            if let Some(number) = find_number_token(&lines[j], true) {
                return Some(format!("{}{}", series, number));
            }
        }
        None
    }

    /// Company-name fallback: section-header windows in direction order,
    /// then the first legal-form line in the top half of the document.
    fn fallback_company_name(&self, lines: &[String], inv: &mut ExtractedInvoice) {
        if inv.has(FieldKey::CompanyName) {
            return;
        }

        // A purchase never takes the buyer header: that side is the user.
        let order: &[Section] = match self.direction {
            Direction::Purchase => &[Section::Seller],
            Direction::Sale => &[Section::Buyer, Section::Seller],
            Direction::Unknown => &[Section::Seller, Section::Buyer],
        };

        for section in order {
            for (i, line) in lines.iter().enumerate() {
                if keywords::line_section(line) != Some(*section) {
                    continue;
                }
                if let Some(value) = value_after_colon(line) {
                    if let Some(name) = self.name_candidate(value) {
                        inv.company_name = Some(name);
                        return;
                    }
                }
                if let Some(name) = self.name_from_window(lines, i) {
                    inv.company_name = Some(name);
                    return;
                }
            }
        }

        let top = lines.len().div_ceil(2);
        for line in &lines[..top] {
            if let Some(name) = self.name_candidate(line) {
                inv.company_name = Some(name);
                return;
            }
        }
    }

    /// Amount fallbacks: keyword-proximate value, totals section, then a
    /// backward scan for a currency-adjacent amount.
    fn fallback_amounts(&self, lines: &[String], inv: &mut ExtractedInvoice) {
        if !inv.has(FieldKey::AmountWithoutVat) {
            inv.amount_without_vat = amount_near_label(lines, FieldKey::AmountWithoutVat);
        }
        if !inv.has(FieldKey::VatAmount) {
            inv.vat_amount = amount_near_label(lines, FieldKey::VatAmount);
        }
        if !inv.has(FieldKey::AmountWithoutVat) {
            inv.amount_without_vat =
                amount_from_totals(lines).or_else(|| amount_backward_scan(lines));
        }
    }

    /// Pass 6: validate the net/VAT pair against the fixed rate set, or
    /// recover the missing amount by searching for `amount x rate`.
    fn cross_validate_vat(&self, lines: &[String], inv: &mut ExtractedInvoice) {
        let net = inv
            .amount_without_vat
            .as_deref()
            .and_then(|s| Decimal::from_str(s).ok());
        let vat_amount = inv
            .vat_amount
            .as_deref()
            .and_then(|s| Decimal::from_str(s).ok());

        let tolerance = Decimal::new(2, 2); // 0.02
        let strict = Decimal::new(1, 2); // 0.01

        match (net, vat_amount) {
            (Some(n), Some(v)) => {
                for rate in VatRate::ALL {
                    let matches = if rate == VatRate::Zero {
                        v.is_zero()
                    } else {
                        (n * rate.as_decimal() - v).abs() <= tolerance
                    };
                    if matches {
                        debug!(rate = rate.percent(), "VAT rate confirmed");
                        inv.vat_rate = Some(rate);
                        return;
                    }
                }
            }
            (Some(n), None) => {
                let pool = document_amounts(lines);
                for rate in [VatRate::Standard21, VatRate::Reduced9, VatRate::Reduced5] {
                    let expected = (n * rate.as_decimal()).round_dp(2);
                    if pool.iter().any(|x| (*x - expected).abs() < strict) {
                        debug!(rate = rate.percent(), "recovered VAT amount");
                        inv.vat_amount = Some(expected.to_string());
                        inv.vat_rate = Some(rate);
                        return;
                    }
                }
            }
            (None, Some(v)) => {
                let pool = document_amounts(lines);
                for rate in [VatRate::Standard21, VatRate::Reduced9, VatRate::Reduced5] {
                    if let Some(x) = pool
                        .iter()
                        .find(|x| (**x * rate.as_decimal() - v).abs() < strict)
                    {
                        debug!(rate = rate.percent(), "recovered net amount");
                        inv.amount_without_vat = Some(x.round_dp(2).to_string());
                        inv.vat_rate = Some(rate);
                        return;
                    }
                }
            }
            (None, None) => {}
        }
    }
}

impl Default for HeuristicParser {
    fn default() -> Self {
        Self::new()
    }
}

fn value_after_colon(line: &str) -> Option<&str> {
    let (_, rest) = line.split_once(':')?;
    let rest = rest.trim();
    (!rest.is_empty()).then_some(rest)
}

fn invoice_id_after_colon(line: &str) -> Option<String> {
    let value = value_after_colon(line)?;
    let token = value.split_whitespace().next()?;
    let len = token.chars().count();
    ((3..=100).contains(&len) && token.chars().any(|c| c.is_alphanumeric()))
        .then(|| token.to_string())
}

/// A usable series token: 2-6 alphanumerics that either contain a letter
/// or are numeric without looking like a four-digit year.
fn is_series_token(token: &str) -> bool {
    let lower = token.to_lowercase();
    if matches!(lower.as_str(), "nr" | "no" | "numeris") {
        return false;
    }
    if token.chars().any(|c| c.is_ascii_alphabetic()) {
        return true;
    }
    !(token.len() == 4 && (token.starts_with("19") || token.starts_with("20")))
}

/// A 3-15 digit number token, preferring one after a number label; a bare
/// token is only taken from text with no date in it.
fn find_number_token(text: &str, allow_bare: bool) -> Option<String> {
    let lower = text.to_lowercase();
    for label in keywords::NUMBER_LABELS {
        if let Some(pos) = lower.find(label) {
            if let Some(tail) = text.get(pos + label.len()..) {
                if let Some(caps) = patterns::NUMBER_TOKEN.captures(tail) {
                    return Some(caps[1].to_string());
                }
            }
        }
    }
    if allow_bare && dates::extract_date(text).is_none() {
        return patterns::NUMBER_TOKEN
            .captures(text)
            .map(|caps| caps[1].to_string());
    }
    None
}

fn amount_near_label(lines: &[String], key: FieldKey) -> Option<String> {
    for (i, line) in lines.iter().enumerate() {
        if keywords::normalize_key(line) != Some(key) {
            continue;
        }
        for candidate in lines.iter().skip(i).take(3) {
            if let Some(a) = amounts::extract_amount_normalized(candidate) {
                return Some(a);
            }
        }
    }
    None
}

/// A totals-section amount: last 20% of the lines, near a currency or
/// total keyword, below a sanity ceiling.
fn amount_from_totals(lines: &[String]) -> Option<String> {
    let count = lines.len().div_ceil(5).max(1);
    let start = lines.len().saturating_sub(count);
    let ceiling = Decimal::from(1_000_000);
    for line in &lines[start..] {
        let lower = line.to_lowercase();
        if !keywords::TOTAL_KEYWORDS.iter().any(|k| lower.contains(k)) {
            continue;
        }
        if let Some(a) = amounts::extract_amount_normalized(line) {
            if Decimal::from_str(&a).map(|v| v < ceiling).unwrap_or(false) {
                return Some(a);
            }
        }
    }
    None
}

fn amount_backward_scan(lines: &[String]) -> Option<String> {
    for line in lines.iter().rev() {
        let lower = line.to_lowercase();
        if !lower.contains("eur") && !line.contains('€') {
            continue;
        }
        if let Some(m) = patterns::AMOUNT_GROUPED.find(line) {
            if let Some(a) = amounts::normalize_amount(m.as_str()) {
                if amounts::is_valid_amount(&a) {
                    return Some(a);
                }
            }
        }
    }
    None
}

fn document_amounts(lines: &[String]) -> Vec<Decimal> {
    let mut pool = Vec::new();
    for line in lines {
        for v in amounts::extract_all_amounts(line) {
            if !pool.contains(&v) {
                pool.push(v);
            }
        }
    }
    pool
}
