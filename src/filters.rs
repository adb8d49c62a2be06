use askama::Result;

// Colour of the status dot used on operation pages.
// Usage in templates: `{{ status|status_color }}`.
#[allow(clippy::unnecessary_wraps)]
pub fn status_color<T: std::fmt::Display>(status: T) -> Result<&'static str> {
    Ok(match status.to_string().as_str() {
        "DRAFT" => "bg-gray",
        "WAITING" => "bg-yellow",
        "READY" => "bg-blue",
        "DONE" => "bg-green",
        _ => "bg-gray",
    })
}

// `{{ qty|signed }}` renders +5 / -3 for ledger movements.
#[allow(clippy::unnecessary_wraps)]
pub fn signed<T: std::fmt::Display>(value: T) -> Result<String> {
    let text = value.to_string();
    Ok(if text.starts_with('-') || text == "0" {
        text
    } else {
        format!("+{}", text)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransactionStatus;

    #[test]
    fn maps_every_status_to_a_colour() {
        assert_eq!(status_color(&TransactionStatus::Draft).unwrap(), "bg-gray");
        assert_eq!(status_color(&TransactionStatus::Waiting).unwrap(), "bg-yellow");
        assert_eq!(status_color(&TransactionStatus::Ready).unwrap(), "bg-blue");
        assert_eq!(status_color(&TransactionStatus::Done).unwrap(), "bg-green");
        assert_eq!(status_color("unknown").unwrap(), "bg-gray");
    }

    #[test]
    fn signs_movements() {
        assert_eq!(signed(5).unwrap(), "+5");
        assert_eq!(signed(-3).unwrap(), "-3");
        assert_eq!(signed(0).unwrap(), "0");
    }
}
