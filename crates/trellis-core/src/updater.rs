use crate::builder::RenderTreeBuilder;
use crate::diff::SYSTEM_ADDED_ATTRIBUTE_SEQUENCE;
use crate::event::FieldValue;
use crate::frame::{AttributeValue, EventHandlerId, FrameKind};

/// Make a component's current tree agree with a value the user already typed
/// into the UI, so the next diff does not write it back.
///
/// Looks for the attribute carrying `handler_id`. If that attribute names an
/// attribute it keeps in sync (`updates_attribute_name`), the value is stored
/// on the enclosing element, inserting the attribute when it is missing.
pub(crate) fn update_to_match_client_state(
    builder: &mut RenderTreeBuilder,
    handler_id: EventHandlerId,
    field_value: &FieldValue,
) {
    let value = match field_value {
        FieldValue::Bool(b) => AttributeValue::Bool(*b),
        FieldValue::Text(s) => AttributeValue::Text(s.as_str().into()),
    };

    let mut closest_element = None;
    let mut synced_attribute = None;
    for (index, frame) in builder.frames().iter().enumerate() {
        match &frame.kind {
            FrameKind::Element { .. } => closest_element = Some(index),
            FrameKind::Attribute {
                event_handler_id: Some(id),
                updates_attribute_name,
                ..
            } if *id == handler_id => {
                synced_attribute = updates_attribute_name.clone();
                break;
            }
            _ => {}
        }
    }

    let (Some(element_index), Some(attribute_name)) = (closest_element, synced_attribute) else {
        return;
    };
    if attribute_name.is_empty() {
        return;
    }
    update_element_attribute(builder, element_index, &attribute_name, value);
}

fn update_element_attribute(
    builder: &mut RenderTreeBuilder,
    element_index: usize,
    attribute_name: &str,
    value: AttributeValue,
) {
    let frames = builder.frames_mut();
    let element_end = element_index + frames[element_index].subtree_length();
    for frame in &mut frames[element_index + 1..element_end] {
        match &mut frame.kind {
            FrameKind::Attribute {
                name,
                value: existing,
                ..
            } => {
                if name.as_str() == attribute_name {
                    *existing = value;
                    return;
                }
            }
            _ => break,
        }
    }

    let insert_at = element_index + 1;
    builder.insert_attribute_expensive(
        insert_at,
        SYSTEM_ADDED_ATTRIBUTE_SEQUENCE,
        attribute_name,
        value,
    );

    let frames = builder.frames_mut();
    for index in 0..=element_index {
        let length = frames[index].subtree_length();
        let is_container = matches!(
            frames[index].kind,
            FrameKind::Element { .. } | FrameKind::Region { .. }
        );
        if is_container && index + length > element_index {
            frames[index].set_subtree_length(length + 1);
        }
    }
    for frame in &mut frames[insert_at + 1..] {
        if let FrameKind::ComponentReferenceCapture {
            parent_frame_index, ..
        } = &mut frame.kind
        {
            if *parent_frame_index >= insert_at {
                *parent_frame_index += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventCallback;

    fn set_handler_id(builder: &mut RenderTreeBuilder, index: usize, id: u64) {
        if let FrameKind::Attribute {
            event_handler_id, ..
        } = &mut builder.frames_mut()[index].kind
        {
            *event_handler_id = Some(EventHandlerId(id));
        }
    }

    fn text_attribute<'a>(builder: &'a RenderTreeBuilder, name: &str) -> Option<&'a str> {
        builder.frames().iter().find_map(|f| match &f.kind {
            FrameKind::Attribute {
                name: n, value, ..
            } if n.as_str() == name => value.as_text(),
            _ => None,
        })
    }

    #[test]
    fn test_updates_existing_attribute() {
        let mut b = RenderTreeBuilder::new();
        b.open_element(0, "input");
        b.add_attribute(1, "value", "old");
        b.add_attribute(2, "onchange", EventCallback::new(|_| Ok(())));
        b.set_updates_attribute_name("value");
        b.close_element();
        b.finish().unwrap();
        set_handler_id(&mut b, 2, 7);

        update_to_match_client_state(&mut b, EventHandlerId(7), &FieldValue::Text("new".into()));
        assert_eq!(text_attribute(&b, "value"), Some("new"));
        assert_eq!(b.len(), 3);
    }

    #[test]
    fn test_inserts_missing_attribute_and_grows_ancestors() {
        let mut b = RenderTreeBuilder::new();
        b.open_element(0, "form");
        b.open_region(1);
        b.open_element(2, "input");
        b.add_attribute(3, "onchange", EventCallback::new(|_| Ok(())));
        b.set_updates_attribute_name("value");
        b.close_element();
        b.close_region();
        b.close_element();
        b.add_content(4, "after");
        b.finish().unwrap();
        set_handler_id(&mut b, 3, 1);

        update_to_match_client_state(&mut b, EventHandlerId(1), &FieldValue::Text("typed".into()));
        let frames = b.frames();
        assert_eq!(frames.len(), 6);
        assert_eq!(frames[3].sequence, SYSTEM_ADDED_ATTRIBUTE_SEQUENCE);
        assert_eq!(text_attribute(&b, "value"), Some("typed"));
        assert_eq!(frames[0].subtree_length(), 5);
        assert_eq!(frames[1].subtree_length(), 4);
        assert_eq!(frames[2].subtree_length(), 3);
        assert_eq!(frames[5].subtree_length(), 1);
    }

    #[test]
    fn test_handler_without_synced_attribute_is_ignored() {
        let mut b = RenderTreeBuilder::new();
        b.open_element(0, "button");
        b.add_attribute(1, "onclick", EventCallback::new(|_| Ok(())));
        b.close_element();
        b.finish().unwrap();
        set_handler_id(&mut b, 1, 3);

        update_to_match_client_state(&mut b, EventHandlerId(3), &FieldValue::Bool(true));
        assert_eq!(b.len(), 2);
    }
}
