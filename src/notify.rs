//! Writing-reminder notifications.
//!
//! A push payload carries at most a text body; everything else about the
//! reminder is fixed: the title, the two actions, and where each click
//! navigates.

/// Title of every reminder notification.
pub const REMINDER_TITLE: &str = "Diary Reminder";

/// Body used when a push arrives with no payload.
pub const DEFAULT_REMINDER_BODY: &str = "Time to write in your diary!";

/// Actions offered on a reminder notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationAction {
  /// "Write Entry" button
  Write,
  /// "Later" button; closes without navigating
  Dismiss,
  /// Click on the notification body
  Open,
}

impl NotificationAction {
  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "write" => Some(Self::Write),
      "dismiss" => Some(Self::Dismiss),
      "open" | "default" => Some(Self::Open),
      _ => None,
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      Self::Write => "Write Entry",
      Self::Dismiss => "Later",
      Self::Open => "Open",
    }
  }
}

/// A reminder rendered from a push payload.
#[derive(Debug, Clone)]
pub struct ReminderNotification {
  pub title: String,
  pub body: String,
  pub actions: [NotificationAction; 2],
}

impl ReminderNotification {
  /// Build from an optional push payload body.
  pub fn from_push(payload: Option<&str>) -> Self {
    let body = payload
      .map(str::trim)
      .filter(|p| !p.is_empty())
      .unwrap_or(DEFAULT_REMINDER_BODY)
      .to_string();

    Self {
      title: REMINDER_TITLE.to_string(),
      body,
      actions: [NotificationAction::Write, NotificationAction::Dismiss],
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn payload_becomes_the_body() {
    let n = ReminderNotification::from_push(Some("You haven't written since Monday."));
    assert_eq!(n.title, REMINDER_TITLE);
    assert_eq!(n.body, "You haven't written since Monday.");
  }

  #[test]
  fn empty_payload_falls_back_to_default_body() {
    assert_eq!(ReminderNotification::from_push(None).body, DEFAULT_REMINDER_BODY);
    assert_eq!(ReminderNotification::from_push(Some("  ")).body, DEFAULT_REMINDER_BODY);
  }

  #[test]
  fn actions_parse_from_wire_names() {
    assert_eq!(NotificationAction::parse("write"), Some(NotificationAction::Write));
    assert_eq!(NotificationAction::parse("dismiss"), Some(NotificationAction::Dismiss));
    assert_eq!(NotificationAction::parse("default"), Some(NotificationAction::Open));
    assert_eq!(NotificationAction::parse("snooze"), None);
  }
}
