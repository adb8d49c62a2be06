use crate::error::AppError;

/// Decoded `application/x-www-form-urlencoded` body that keeps repeated
/// keys, which `axum::Form` cannot deserialize into parallel lists.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FormFields(Vec<(String, String)>);

impl FormFields {
    pub fn parse(body: &str) -> Result<Self, AppError> {
        let mut fields = Vec::new();
        for pair in body.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            fields.push((decode(key)?, decode(value)?));
        }
        Ok(Self(fields))
    }

    /// First value for `key`, trimmed; `None` when missing or blank.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_string)
    }

    /// Every value for `key` in submission order, blanks included.
    pub fn all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.trim())
    }
}

fn decode(raw: &str) -> Result<String, AppError> {
    urlencoding::decode(&raw.replace('+', " "))
        .map(|s| s.into_owned())
        .map_err(|_| AppError::Validation("Form data is not valid UTF-8".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_repeated_fields_in_order() {
        let form = FormFields::parse("product_id=a&quantity=2&product_id=b&quantity=5").unwrap();
        assert_eq!(form.all("product_id").collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(form.all("quantity").collect::<Vec<_>>(), vec!["2", "5"]);
    }

    #[test]
    fn decodes_plus_and_percent_escapes() {
        let form = FormFields::parse("supplier=Acme+%26+Sons&notes=fragile%21&reference=").unwrap();
        assert_eq!(form.get("supplier"), Some("Acme & Sons"));
        assert_eq!(form.get("notes"), Some("fragile!"));
        assert_eq!(form.get("reference"), None);
        assert_eq!(form.get("missing"), None);
    }

    #[test]
    fn rejects_invalid_utf8() {
        assert!(FormFields::parse("notes=%FF").is_err());
    }
}
