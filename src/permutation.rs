use crate::attacks::Attack;
use crate::error::DomainError;
use std::collections::HashSet;
use tracing::debug;

/// Lowercases a protected domain and strips a wildcard prefix and a trailing
/// root dot.
pub fn normalize_domain(input: &str) -> Result<String, DomainError> {
    let trimmed = input.trim();
    let trimmed = trimmed.strip_prefix("*.").unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix('.').unwrap_or(trimmed);

    if trimmed.is_empty() {
        return Err(DomainError::Empty);
    }

    if trimmed
        .chars()
        .any(|c| c == '/' || c == '\\' || c.is_whitespace())
    {
        return Err(DomainError::InvalidCharacter(trimmed.to_string()));
    }

    let domain = trimmed.to_lowercase();
    if leftmost_label(&domain).is_empty() {
        return Err(DomainError::EmptyLabel(domain));
    }

    Ok(domain)
}

pub fn leftmost_label(domain: &str) -> &str {
    domain.split('.').next().unwrap_or(domain)
}

/// True when every dot-separated segment is an LDH hostname label.
pub fn is_valid_hostname(candidate: &str) -> bool {
    candidate.split('.').all(|segment| {
        !segment.is_empty()
            && segment.len() <= 63
            && !segment.starts_with('-')
            && !segment.ends_with('-')
            && segment
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    })
}

/// The punycode (`xn--`) form of a non-ASCII candidate, if it has one.
fn ascii_form(candidate: &str) -> Option<String> {
    if candidate.is_ascii() {
        return None;
    }
    idna::domain_to_ascii(candidate)
        .ok()
        .filter(|encoded| encoded.contains("xn--"))
}

/// Every lookalike label derived from one protected domain, plus the
/// unmodified label itself. Built once and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSet {
    protected_domain: String,
    label: String,
    candidates: HashSet<String>,
}

impl CandidateSet {
    pub fn build(domain: &str) -> Result<Self, DomainError> {
        Self::build_with(domain, &Attack::ALL)
    }

    pub fn build_with(domain: &str, attacks: &[Attack]) -> Result<Self, DomainError> {
        let protected_domain = normalize_domain(domain)?;
        let label = leftmost_label(&protected_domain).to_string();

        let mut candidates = HashSet::new();
        for attack in attacks {
            let variations = attack.generate(&label);
            debug!(attack = %attack, count = variations.len(), "generated variations");
            candidates.extend(variations);
        }
        candidates.insert(label.clone());

        // Certificates carry internationalized names in their ASCII form.
        let encoded: Vec<String> = candidates.iter().filter_map(|c| ascii_form(c)).collect();
        debug!(count = encoded.len(), "added punycode forms");
        candidates.extend(encoded);

        Ok(Self {
            protected_domain,
            label,
            candidates,
        })
    }

    /// Drops candidates that could never be registered as a hostname. The
    /// protected label always stays.
    pub fn retain_valid_hostnames(&mut self) {
        let label = &self.label;
        self.candidates
            .retain(|candidate| candidate == label || is_valid_hostname(candidate));
    }

    pub fn protected_domain(&self) -> &str {
        &self.protected_domain
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn contains(&self, label: &str) -> bool {
        self.candidates.contains(label)
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.candidates.iter().map(String::as_str)
    }

    pub fn sorted(&self) -> Vec<&str> {
        let mut sorted: Vec<&str> = self.iter().collect();
        sorted.sort_unstable();
        sorted
    }
}
