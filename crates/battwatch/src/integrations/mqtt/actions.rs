use serde_json::Value;

use crate::engine::ActionEvent;
use crate::notify::ACTION_PREFIX;

/// Parse a notification-action payload from the action topic.
///
/// The hub-side automation may relay the full event JSON, a bare
/// `{"action": "..."}` object, or just the action string. Anything that
/// isn't a battwatch action is ignored.
pub fn parse_action(payload: &[u8]) -> Option<ActionEvent> {
    let text = std::str::from_utf8(payload).ok()?;

    let action = match serde_json::from_str::<Value>(text) {
        Ok(Value::String(s)) => s,
        Ok(value) => value
            .get("action")
            .or_else(|| value.get("data").and_then(|d| d.get("action")))?
            .as_str()?
            .to_string(),
        Err(_) => text.trim().to_string(),
    };

    let mut parts = action.splitn(3, '.');
    if parts.next() != Some(ACTION_PREFIX) {
        return None;
    }

    match (parts.next(), parts.next()) {
        (Some("dismiss"), Some(person)) if !person.is_empty() => Some(ActionEvent::Dismiss {
            person: person.to_string(),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_action_string() {
        assert_eq!(
            parse_action(b"battwatch.dismiss.anna"),
            Some(ActionEvent::Dismiss {
                person: "anna".to_string()
            })
        );
    }

    #[test]
    fn test_parse_json_object() {
        assert_eq!(
            parse_action(br#"{"action": "battwatch.dismiss.bjorn"}"#),
            Some(ActionEvent::Dismiss {
                person: "bjorn".to_string()
            })
        );
    }

    #[test]
    fn test_parse_relayed_event_payload() {
        let payload = br#"{
            "event_type": "mobile_app_notification_action",
            "data": { "action": "battwatch.dismiss.anna" }
        }"#;
        assert_eq!(
            parse_action(payload),
            Some(ActionEvent::Dismiss {
                person: "anna".to_string()
            })
        );
    }

    #[test]
    fn test_parse_json_string() {
        assert_eq!(
            parse_action(br#""battwatch.dismiss.anna""#),
            Some(ActionEvent::Dismiss {
                person: "anna".to_string()
            })
        );
    }

    #[test]
    fn test_foreign_actions_are_ignored() {
        assert_eq!(parse_action(b"someone_else.dismiss.anna"), None);
        assert_eq!(parse_action(b"battwatch.snooze.anna"), None);
        assert_eq!(parse_action(b"battwatch.dismiss."), None);
        assert_eq!(parse_action(b"battwatch.dismiss"), None);
        assert_eq!(parse_action(br#"{"event_type": "unrelated"}"#), None);
        assert_eq!(parse_action(&[0xff, 0xfe]), None);
    }
}
