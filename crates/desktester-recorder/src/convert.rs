//! Event-to-Step - raw events plus resolved elements become steps

use crate::events::{RawEvent, RawEventKind};
use desktester_core::roles::DOCK_ITEM;
use desktester_core::{ActionType, LocatorStrategy, Step, UIElement};

/// Numbers steps `step_1`, `step_2`, ... from the last reset.
#[derive(Debug, Default)]
pub struct EventToStep {
    counter: usize,
}

impl EventToStep {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.counter = 0;
    }

    pub fn count(&self) -> usize {
        self.counter
    }

    /// `None` for events that carry nothing to replay (a key event without a
    /// key). Such events don't consume a step number.
    pub fn convert(&mut self, event: &RawEvent, element: Option<&UIElement>, target: Option<LocatorStrategy>) -> Option<Step> {
        let mut step = match event.kind {
            RawEventKind::Click => match element {
                Some(el) if el.role == DOCK_ITEM => {
                    let name = el.title.as_deref().or(el.label.as_deref()).unwrap_or("Unknown");
                    Step::new("", ActionType::LaunchApp).with_description(format!("Launch {}", name))
                }
                _ => pointer_step(ActionType::Click, "Click", element, target),
            },
            RawEventKind::DoubleClick => pointer_step(ActionType::DoubleClick, "Double-click", element, target),
            RawEventKind::RightClick => pointer_step(ActionType::RightClick, "Right-click", element, target),
            RawEventKind::KeyPress => key_step(event, element, target)?,
        };
        self.counter += 1;
        step.id = format!("step_{}", self.counter);
        Some(step)
    }
}

fn pointer_step(action: ActionType, verb: &str, element: Option<&UIElement>, target: Option<LocatorStrategy>) -> Step {
    let step = Step::new("", action).with_description(describe(verb, element));
    match target {
        Some(target) => step.with_target(target),
        None => step,
    }
}

fn key_step(event: &RawEvent, element: Option<&UIElement>, target: Option<LocatorStrategy>) -> Option<Step> {
    let key = event.key.as_deref().filter(|k| !k.is_empty())?;
    let suffix = suffix(element);

    let step = if event.is_printable() && !event.modifiers.any() {
        Step::new("", ActionType::TypeText)
            .with_text(key)
            .with_description(format!("Type \"{}\"{}", key, suffix))
    } else {
        let mut keys = event.modifiers.names();
        keys.push(key.to_string());
        Step::new("", ActionType::KeyCombo)
            .with_description(format!("Key combo: {}{}", keys.join("+"), suffix))
            .with_keys(keys)
    };
    Some(match target {
        Some(target) => step.with_target(target),
        None => step,
    })
}

/// `Click "OK" (button)`, `Click button`, or just `Click`.
fn describe(verb: &str, element: Option<&UIElement>) -> String {
    match element {
        None => verb.to_string(),
        Some(el) => match el.display_name() {
            Some(name) => format!("{} \"{}\" ({})", verb, name, el.role),
            None => format!("{} {}", verb, el.role),
        },
    }
}

/// ` in "Name" (role)` for key steps; values are left out since they change
/// as the user types.
fn suffix(element: Option<&UIElement>) -> String {
    let Some(el) = element else {
        return String::new();
    };
    let name = [el.title.as_deref(), el.label.as_deref(), el.identifier.as_deref()]
        .into_iter()
        .flatten()
        .find(|s| !s.is_empty());
    match name {
        Some(name) => format!(" in \"{}\" ({})", name, el.role),
        None if !el.role.is_empty() => format!(" in {}", el.role),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use desktester_core::keys::Modifiers;
    use pretty_assertions::assert_eq;

    #[test]
    fn click_describes_element() {
        let mut conv = EventToStep::new();
        let el = UIElement::new("button").with_title("OK");
        let step = conv
            .convert(&RawEvent::click(1.0, 1.0), Some(&el), Some(LocatorStrategy::id("btnOK")))
            .unwrap();
        assert_eq!(step.id, "step_1");
        assert_eq!(step.action, ActionType::Click);
        assert_eq!(step.description, "Click \"OK\" (button)");
        assert_eq!(step.target, Some(LocatorStrategy::id("btnOK")));

        let bare = conv.convert(&RawEvent::right_click(1.0, 1.0), None, None).unwrap();
        assert_eq!(bare.id, "step_2");
        assert_eq!(bare.description, "Right-click");
        assert_eq!(bare.target, None);
    }

    #[test]
    fn dock_item_click_launches() {
        let mut conv = EventToStep::new();
        let el = UIElement::new(DOCK_ITEM).with_title("Calculator");
        let step = conv
            .convert(&RawEvent::click(1.0, 1.0), Some(&el), Some(LocatorStrategy::point(1.0, 1.0)))
            .unwrap();
        assert_eq!(step.action, ActionType::LaunchApp);
        assert_eq!(step.description, "Launch Calculator");
        assert_eq!(step.target, None);

        // Only plain clicks launch; a double click stays a double click.
        let dbl = conv.convert(&RawEvent::double_click(1.0, 1.0), Some(&el), None).unwrap();
        assert_eq!(dbl.action, ActionType::DoubleClick);
    }

    #[test]
    fn keys_map_to_text_or_combo() {
        let mut conv = EventToStep::new();
        let field = UIElement::new("text_field").with_label("Name");

        let typed = conv.convert(&RawEvent::key("H"), Some(&field), None).unwrap();
        assert_eq!(typed.action, ActionType::TypeText);
        assert_eq!(typed.text.as_deref(), Some("H"));
        assert_eq!(typed.description, "Type \"H\" in \"Name\" (text_field)");

        let copy = RawEvent::key("c").with_modifiers(Modifiers(Modifiers::CMD));
        let combo = conv.convert(&copy, None, None).unwrap();
        assert_eq!(combo.action, ActionType::KeyCombo);
        assert_eq!(combo.keys, vec!["cmd", "c"]);
        assert_eq!(combo.description, "Key combo: cmd+c");

        let ret = conv.convert(&RawEvent::key("return"), None, None).unwrap();
        assert_eq!(ret.action, ActionType::KeyCombo);
        assert_eq!(ret.keys, vec!["return"]);
        assert_eq!(ret.id, "step_3");
    }

    #[test]
    fn reset_restarts_numbering() {
        let mut conv = EventToStep::new();
        conv.convert(&RawEvent::click(0.0, 0.0), None, None);
        conv.convert(&RawEvent::click(0.0, 0.0), None, None);
        conv.reset();
        let step = conv.convert(&RawEvent::click(0.0, 0.0), None, None).unwrap();
        assert_eq!(step.id, "step_1");
    }

    #[test]
    fn keyless_events_are_ignored() {
        let mut conv = EventToStep::new();
        let mut event = RawEvent::key("");
        assert!(conv.convert(&event, None, None).is_none());
        event.key = None;
        assert!(conv.convert(&event, None, None).is_none());
        assert_eq!(conv.count(), 0);
    }
}
