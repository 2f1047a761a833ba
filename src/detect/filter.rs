use crate::detect::result::Detection;

/// Keep only detections of the person class, in the order the backend
/// returned them.
///
/// No other transformation is applied. An empty result means nobody is in
/// view.
pub fn filter_persons(detections: &[Detection], person_class_id: i64) -> Vec<Detection> {
    detections
        .iter()
        .filter(|det| det.class_id == person_class_id)
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::{BoundingBox, PERSON_CLASS_ID};

    fn det(y1: f32, class_id: i64) -> Detection {
        Detection::new(BoundingBox::new(0.0, y1, 10.0, y1 + 10.0), 0.8, class_id)
    }

    #[test]
    fn keeps_person_class_in_backend_order() {
        let detections = vec![det(5.0, 0), det(1.0, 56), det(3.0, 0), det(2.0, 62)];
        let persons = filter_persons(&detections, PERSON_CLASS_ID);

        assert_eq!(persons.len(), 2);
        assert_eq!(persons[0].bbox.y1, 5.0);
        assert_eq!(persons[1].bbox.y1, 3.0);
    }

    #[test]
    fn filtering_is_idempotent() {
        let detections = vec![det(5.0, 0), det(1.0, 56), det(3.0, 0)];
        let once = filter_persons(&detections, PERSON_CLASS_ID);
        let twice = filter_persons(&detections, PERSON_CLASS_ID);
        assert_eq!(once, twice);
        assert_eq!(filter_persons(&once, PERSON_CLASS_ID), once);
    }

    #[test]
    fn empty_input_and_custom_class() {
        assert!(filter_persons(&[], PERSON_CLASS_ID).is_empty());

        let detections = vec![det(5.0, 0), det(1.0, 7)];
        let persons = filter_persons(&detections, 7);
        assert_eq!(persons, vec![det(1.0, 7)]);
    }
}
