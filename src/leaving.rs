use crate::detect::Detection;

pub const DEFAULT_DESK_LEVEL: i64 = 300;

/// Level-triggered desk-leaving check.
///
/// True when any person's vertical midpoint, `floor((y1 + y2) / 2)`, sits
/// strictly above the desk row (a smaller pixel row). Evaluated fresh on
/// every call with no memory of earlier frames, so it keeps reporting for as
/// long as the condition holds.
pub fn is_leaving(persons: &[Detection], desk_level: i64) -> bool {
    persons
        .iter()
        .any(|person| person.bbox.vertical_midpoint() < desk_level)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_midpoint(mid: f32) -> Detection {
        Detection::person(0.0, mid - 50.0, 100.0, mid + 50.0)
    }

    #[test]
    fn any_midpoint_above_desk_triggers() {
        let persons = [with_midpoint(250.0), with_midpoint(310.0)];
        assert!(is_leaving(&persons, DEFAULT_DESK_LEVEL));

        let persons = [with_midpoint(310.0), with_midpoint(320.0)];
        assert!(!is_leaving(&persons, DEFAULT_DESK_LEVEL));
    }

    #[test]
    fn repeated_calls_are_not_suppressed() {
        let persons = [with_midpoint(250.0)];
        assert!(is_leaving(&persons, 300));
        assert!(is_leaving(&persons, 300));
    }

    #[test]
    fn midpoint_on_desk_row_is_not_leaving() {
        assert!(!is_leaving(&[with_midpoint(300.0)], 300));
        // floor(299.5) = 299
        let person = Detection::person(0.0, 299.0, 10.0, 300.0);
        assert!(is_leaving(&[person], 300));
    }

    #[test]
    fn nobody_in_view_is_not_leaving() {
        assert!(!is_leaving(&[], 300));
    }
}
