use serde::{Deserialize, Serialize};

/// Fixed subject fields stamped onto every issued certificate.
///
/// Only the common name varies per certificate, and it always comes from the
/// redeemed identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectTemplate {
    /// Country code (C)
    #[serde(default = "default_country")]
    pub country: String,

    /// Organization (O)
    #[serde(default = "default_organization")]
    pub organization: String,

    /// Organizational unit (OU)
    #[serde(default = "default_organizational_unit")]
    pub organizational_unit: String,

    /// Locality (L)
    #[serde(default = "default_locality")]
    pub locality: String,

    /// Province or state (ST)
    #[serde(default = "default_province")]
    pub province: String,
}

impl Default for SubjectTemplate {
    fn default() -> Self {
        Self {
            country: default_country(),
            organization: default_organization(),
            organizational_unit: default_organizational_unit(),
            locality: default_locality(),
            province: default_province(),
        }
    }
}

impl SubjectTemplate {
    /// Render the subject string a CSR for `common_name` must carry
    #[must_use]
    pub fn subject_for(&self, common_name: &str) -> String {
        format!(
            "OU={},O={},L={},ST={},C={},CN={}",
            self.organizational_unit,
            self.organization,
            self.locality,
            self.province,
            self.country,
            common_name
        )
    }
}

fn default_country() -> String {
    String::from("DE")
}

fn default_organization() -> String {
    String::from("Organization")
}

fn default_organizational_unit() -> String {
    String::from("OrgUnit")
}

fn default_locality() -> String {
    String::from("Waldorf")
}

fn default_province() -> String {
    String::from("Waldorf")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_for() {
        let subject = SubjectTemplate::default().subject_for("orders");
        assert_eq!(subject, "OU=OrgUnit,O=Organization,L=Waldorf,ST=Waldorf,C=DE,CN=orders");
    }

    #[test]
    fn test_partial_template_uses_defaults() {
        let template: SubjectTemplate =
            serde_json::from_str(r#"{"country": "PL", "organization": "Acme"}"#).unwrap();
        assert_eq!(template.country, "PL");
        assert_eq!(template.organization, "Acme");
        assert_eq!(template.locality, "Waldorf");
    }
}
