//! Replays batches against an in-memory UI tree, the same way a browser
//! front end applies them to the DOM.

use crate::error::ApplyError;
use crate::snapshot::{BatchSnapshot, FrameSnapshot};
use smallvec::SmallVec;
use smartstring::alias::String as SmartString;
use std::collections::HashMap;
use std::fmt::Write;
use tracing::trace;
use trellis_core::{ComponentId, EventHandlerId, RenderTreeEdit};

type Result<T> = std::result::Result<T, ApplyError>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiElement {
    pub name: SmartString,
    pub attributes: SmallVec<[(SmartString, SmartString); 4]>,
    /// Event attributes, keyed by attribute name such as `onclick`
    pub handlers: SmallVec<[(SmartString, EventHandlerId); 2]>,
    pub reference_id: Option<SmartString>,
    pub children: Vec<UiNode>,
}

impl UiElement {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn handler(&self, name: &str) -> Option<EventHandlerId> {
        self.handlers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, id)| *id)
    }

    fn set_attribute(&mut self, frame: &FrameSnapshot, index: i32) -> Result<()> {
        let FrameSnapshot::Attribute {
            name,
            value,
            event_handler_id,
        } = frame
        else {
            return Err(ApplyError::UnexpectedFrame(index, "an attribute"));
        };
        if let Some(id) = event_handler_id {
            match self.handlers.iter_mut().find(|(n, _)| n == name) {
                Some(slot) => slot.1 = *id,
                None => self.handlers.push((name.clone(), *id)),
            }
            return Ok(());
        }
        match value {
            Some(value) => match self.attributes.iter_mut().find(|(n, _)| n == name) {
                Some(slot) => slot.1 = value.clone(),
                None => self.attributes.push((name.clone(), value.clone())),
            },
            None => self.remove_attribute(name),
        }
        Ok(())
    }

    fn remove_attribute(&mut self, name: &str) {
        self.attributes.retain(|(n, _)| n != name);
        self.handlers.retain(|(n, _)| n != name);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiNode {
    Element(UiElement),
    Text(SmartString),
    Markup(SmartString),
    /// Placeholder whose content is that component's own child list
    Component(ComponentId),
}

/// Child lists of every live component
#[derive(Debug, Default)]
pub struct UiTree {
    components: HashMap<ComponentId, Vec<UiNode>>,
}

impl UiTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn contains(&self, component_id: ComponentId) -> bool {
        self.components.contains_key(&component_id)
    }

    pub fn children(&self, component_id: ComponentId) -> Option<&[UiNode]> {
        self.components.get(&component_id).map(Vec::as_slice)
    }

    pub fn apply(&mut self, batch: &BatchSnapshot) -> Result<()> {
        for diff in &batch.updated_components {
            let root = self.components.entry(diff.component_id).or_default();
            apply_edits(root, &diff.edits, &batch.reference_frames)?;
            trace!(
                component_id = %diff.component_id,
                edits = diff.edits.len(),
                "applied diff"
            );
        }
        for id in &batch.disposed_component_ids {
            self.components.remove(id);
        }
        Ok(())
    }

    /// HTML of a component with nested components expanded inline
    pub fn to_html(&self, component_id: ComponentId) -> Result<String> {
        let children = self
            .children(component_id)
            .ok_or(ApplyError::UnknownComponent(component_id))?;
        let mut out = String::new();
        self.write_nodes(children, &mut out);
        Ok(out)
    }

    fn write_nodes(&self, nodes: &[UiNode], out: &mut String) {
        for node in nodes {
            match node {
                UiNode::Text(text) => escape_into(text, false, out),
                UiNode::Markup(markup) => out.push_str(markup),
                UiNode::Component(id) => {
                    if let Some(children) = self.components.get(id) {
                        self.write_nodes(children, out);
                    }
                }
                UiNode::Element(element) => {
                    let _ = write!(out, "<{}", element.name);
                    for (name, value) in &element.attributes {
                        let _ = write!(out, " {name}=\"");
                        escape_into(value, true, out);
                        out.push('"');
                    }
                    out.push('>');
                    self.write_nodes(&element.children, out);
                    let _ = write!(out, "</{}>", element.name);
                }
            }
        }
    }

    /// Handler bound to `event_attribute` on the first element, in document
    /// order, whose text content is `label`
    pub fn find_handler(
        &self,
        component_id: ComponentId,
        event_attribute: &str,
        label: &str,
    ) -> Option<EventHandlerId> {
        let children = self.components.get(&component_id)?;
        self.find_in(children, event_attribute, label)
    }

    fn find_in(&self, nodes: &[UiNode], event_attribute: &str, label: &str) -> Option<EventHandlerId> {
        for node in nodes {
            let found = match node {
                UiNode::Element(element) => {
                    let handler = element.handler(event_attribute);
                    if handler.is_some() && self.text_content(&element.children) == label {
                        handler
                    } else {
                        self.find_in(&element.children, event_attribute, label)
                    }
                }
                UiNode::Component(id) => self
                    .components
                    .get(id)
                    .and_then(|children| self.find_in(children, event_attribute, label)),
                _ => None,
            };
            if found.is_some() {
                return found;
            }
        }
        None
    }

    /// Every element carrying a handler for `event_attribute`, in document order
    pub fn handlers(&self, component_id: ComponentId, event_attribute: &str) -> Vec<EventHandlerId> {
        let mut out = Vec::new();
        if let Some(children) = self.components.get(&component_id) {
            self.collect_handlers(children, event_attribute, &mut out);
        }
        out
    }

    fn collect_handlers(&self, nodes: &[UiNode], event_attribute: &str, out: &mut Vec<EventHandlerId>) {
        for node in nodes {
            match node {
                UiNode::Element(element) => {
                    out.extend(element.handler(event_attribute));
                    self.collect_handlers(&element.children, event_attribute, out);
                }
                UiNode::Component(id) => {
                    if let Some(children) = self.components.get(id) {
                        self.collect_handlers(children, event_attribute, out);
                    }
                }
                _ => {}
            }
        }
    }

    fn text_content(&self, nodes: &[UiNode]) -> String {
        let mut out = String::new();
        self.collect_text(nodes, &mut out);
        out
    }

    fn collect_text(&self, nodes: &[UiNode], out: &mut String) {
        for node in nodes {
            match node {
                UiNode::Text(text) | UiNode::Markup(text) => out.push_str(text),
                UiNode::Element(element) => self.collect_text(&element.children, out),
                UiNode::Component(id) => {
                    if let Some(children) = self.components.get(id) {
                        self.collect_text(children, out);
                    }
                }
            }
        }
    }
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

fn apply_edits(
    root: &mut Vec<UiNode>,
    edits: &[RenderTreeEdit],
    frames: &[FrameSnapshot],
) -> Result<()> {
    let mut path: SmallVec<[usize; 8]> = SmallVec::new();
    let mut permutation: SmallVec<[(usize, usize); 8]> = SmallVec::new();

    for edit in edits {
        let siblings = children_at(root, &path)?;
        match edit {
            RenderTreeEdit::PrependFrame {
                sibling_index,
                reference_frame_index,
            } => {
                let at = position(siblings, *sibling_index, true)?;
                let mut nodes = Vec::new();
                build_nodes(frames, frame_index(*reference_frame_index)?, &mut nodes)?;
                for (offset, node) in nodes.into_iter().enumerate() {
                    siblings.insert(at + offset, node);
                }
            }
            RenderTreeEdit::RemoveFrame { sibling_index } => {
                let at = position(siblings, *sibling_index, false)?;
                siblings.remove(at);
            }
            RenderTreeEdit::SetAttribute {
                sibling_index,
                reference_frame_index,
            } => {
                let frame = reference_frame(frames, *reference_frame_index)?;
                element_at(siblings, *sibling_index)?.set_attribute(frame, *reference_frame_index)?;
            }
            RenderTreeEdit::RemoveAttribute {
                sibling_index,
                removed_attribute_name,
            } => {
                element_at(siblings, *sibling_index)?.remove_attribute(removed_attribute_name);
            }
            RenderTreeEdit::UpdateText {
                sibling_index,
                reference_frame_index,
            } => {
                let FrameSnapshot::Text { content } =
                    reference_frame(frames, *reference_frame_index)?
                else {
                    return Err(ApplyError::UnexpectedFrame(*reference_frame_index, "text"));
                };
                let at = position(siblings, *sibling_index, false)?;
                match &mut siblings[at] {
                    UiNode::Text(text) => *text = content.clone(),
                    _ => {
                        return Err(ApplyError::UnexpectedNode {
                            index: *sibling_index,
                            expected: "text",
                        });
                    }
                }
            }
            RenderTreeEdit::UpdateMarkup {
                sibling_index,
                reference_frame_index,
            } => {
                let FrameSnapshot::Markup { content } =
                    reference_frame(frames, *reference_frame_index)?
                else {
                    return Err(ApplyError::UnexpectedFrame(*reference_frame_index, "markup"));
                };
                let at = position(siblings, *sibling_index, false)?;
                siblings[at] = UiNode::Markup(content.clone());
            }
            RenderTreeEdit::StepIn { sibling_index } => {
                element_at(siblings, *sibling_index)?;
                path.push(*sibling_index as usize);
            }
            RenderTreeEdit::StepOut => {
                path.pop().ok_or(ApplyError::UnbalancedStepOut)?;
            }
            RenderTreeEdit::PermutationListEntry {
                sibling_index,
                move_to_sibling_index,
            } => {
                let from = position(siblings, *sibling_index, false)?;
                let to = position(siblings, *move_to_sibling_index, false)?;
                permutation.push((from, to));
            }
            RenderTreeEdit::PermutationListEnd => {
                apply_permutation(siblings, &permutation)?;
                permutation.clear();
            }
        }
    }
    Ok(())
}

/// Move every listed node at once
fn apply_permutation(siblings: &mut [UiNode], entries: &[(usize, usize)]) -> Result<()> {
    let mut sources: SmallVec<[usize; 8]> = entries.iter().map(|(from, _)| *from).collect();
    let mut targets: SmallVec<[usize; 8]> = entries.iter().map(|(_, to)| *to).collect();
    sources.sort_unstable();
    targets.sort_unstable();
    if sources != targets || sources.windows(2).any(|w| w[0] == w[1]) {
        return Err(ApplyError::InvalidPermutation);
    }
    let moved: Vec<(usize, UiNode)> = entries
        .iter()
        .map(|&(from, to)| (to, siblings[from].clone()))
        .collect();
    for (to, node) in moved {
        siblings[to] = node;
    }
    Ok(())
}

fn children_at<'n>(root: &'n mut Vec<UiNode>, path: &[usize]) -> Result<&'n mut Vec<UiNode>> {
    let mut list = root;
    for &index in path {
        let len = list.len();
        list = match list.get_mut(index) {
            Some(UiNode::Element(element)) => &mut element.children,
            Some(_) => {
                return Err(ApplyError::UnexpectedNode {
                    index: index as i32,
                    expected: "an element",
                });
            }
            None => {
                return Err(ApplyError::SiblingOutOfRange {
                    index: index as i32,
                    len,
                });
            }
        };
    }
    Ok(list)
}

/// Validate a sibling index. Inserting may target one past the end.
fn position(siblings: &[UiNode], index: i32, inserting: bool) -> Result<usize> {
    let limit = if inserting { siblings.len() + 1 } else { siblings.len() };
    usize::try_from(index)
        .ok()
        .filter(|&i| i < limit)
        .ok_or(ApplyError::SiblingOutOfRange {
            index,
            len: siblings.len(),
        })
}

fn element_at(siblings: &mut [UiNode], index: i32) -> Result<&mut UiElement> {
    let at = position(siblings, index, false)?;
    match &mut siblings[at] {
        UiNode::Element(element) => Ok(element),
        _ => Err(ApplyError::UnexpectedNode {
            index,
            expected: "an element",
        }),
    }
}

fn frame_index(index: i32) -> Result<usize> {
    usize::try_from(index).map_err(|_| ApplyError::MissingReferenceFrame(index))
}

fn reference_frame(frames: &[FrameSnapshot], index: i32) -> Result<&FrameSnapshot> {
    frames
        .get(frame_index(index)?)
        .ok_or(ApplyError::MissingReferenceFrame(index))
}

/// Build the nodes a frame subtree produces. Regions contribute their
/// children directly; attributes and captures produce nothing.
fn build_nodes(frames: &[FrameSnapshot], index: usize, out: &mut Vec<UiNode>) -> Result<()> {
    let frame = frames
        .get(index)
        .ok_or(ApplyError::MissingReferenceFrame(index as i32))?;
    match frame {
        FrameSnapshot::Element {
            name,
            subtree_length,
        } => {
            let mut element = UiElement {
                name: name.clone(),
                ..UiElement::default()
            };
            let end = index + subtree_length;
            let mut child = index + 1;
            while child < end {
                let child_frame = frames
                    .get(child)
                    .ok_or(ApplyError::MissingReferenceFrame(child as i32))?;
                match child_frame {
                    FrameSnapshot::Attribute { .. } => {
                        element.set_attribute(child_frame, child as i32)?
                    }
                    FrameSnapshot::ElementReferenceCapture { reference_id } => {
                        element.reference_id = reference_id.clone()
                    }
                    _ => build_nodes(frames, child, &mut element.children)?,
                }
                child += child_frame.subtree_length().max(1);
            }
            out.push(UiNode::Element(element));
        }
        FrameSnapshot::Region { subtree_length } => {
            let end = index + subtree_length;
            let mut child = index + 1;
            while child < end {
                build_nodes(frames, child, out)?;
                child += frames
                    .get(child)
                    .map_or(1, |f| f.subtree_length().max(1));
            }
        }
        FrameSnapshot::Text { content } => out.push(UiNode::Text(content.clone())),
        FrameSnapshot::Markup { content } => out.push(UiNode::Markup(content.clone())),
        FrameSnapshot::Component { component_id, .. } => {
            let id = component_id.ok_or(ApplyError::UninitializedComponent)?;
            out.push(UiNode::Component(id));
        }
        FrameSnapshot::Attribute { .. }
        | FrameSnapshot::ElementReferenceCapture { .. }
        | FrameSnapshot::ComponentReferenceCapture => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::DiffSnapshot;

    fn text(s: &str) -> FrameSnapshot {
        FrameSnapshot::Text { content: s.into() }
    }

    fn batch(edits: Vec<RenderTreeEdit>, reference_frames: Vec<FrameSnapshot>) -> BatchSnapshot {
        BatchSnapshot {
            updated_components: vec![DiffSnapshot {
                component_id: ComponentId(0),
                edits,
            }],
            reference_frames,
            ..BatchSnapshot::default()
        }
    }

    fn prepend(sibling_index: i32, reference_frame_index: i32) -> RenderTreeEdit {
        RenderTreeEdit::PrependFrame {
            sibling_index,
            reference_frame_index,
        }
    }

    #[test]
    fn test_prepend_element_with_attributes_and_region() {
        let mut tree = UiTree::new();
        tree.apply(&batch(
            vec![prepend(0, 0)],
            vec![
                FrameSnapshot::Element {
                    subtree_length: 6,
                    name: "ul".into(),
                },
                FrameSnapshot::Attribute {
                    name: "class".into(),
                    value: Some("items".into()),
                    event_handler_id: None,
                },
                FrameSnapshot::Attribute {
                    name: "onclick".into(),
                    value: None,
                    event_handler_id: Some(EventHandlerId(3)),
                },
                FrameSnapshot::Region { subtree_length: 3 },
                text("a"),
                text("b<"),
            ],
        ))
        .unwrap();
        assert_eq!(
            tree.to_html(ComponentId(0)).unwrap(),
            "<ul class=\"items\">ab&lt;</ul>"
        );
        assert_eq!(tree.handlers(ComponentId(0), "onclick"), vec![EventHandlerId(3)]);
    }

    #[test]
    fn test_step_in_update_and_remove() {
        let mut tree = UiTree::new();
        tree.apply(&batch(
            vec![prepend(0, 0), prepend(1, 2)],
            vec![
                FrameSnapshot::Element {
                    subtree_length: 2,
                    name: "p".into(),
                },
                text("hello"),
                text("tail"),
            ],
        ))
        .unwrap();
        tree.apply(&batch(
            vec![
                RenderTreeEdit::StepIn { sibling_index: 0 },
                RenderTreeEdit::UpdateText {
                    sibling_index: 0,
                    reference_frame_index: 0,
                },
                RenderTreeEdit::StepOut,
                RenderTreeEdit::RemoveFrame { sibling_index: 1 },
            ],
            vec![text("world")],
        ))
        .unwrap();
        assert_eq!(tree.to_html(ComponentId(0)).unwrap(), "<p>world</p>");
    }

    #[test]
    fn test_permutation_moves_all_entries_at_once() {
        let mut tree = UiTree::new();
        tree.apply(&batch(
            vec![prepend(0, 0), prepend(1, 1), prepend(2, 2)],
            vec![text("a"), text("b"), text("c")],
        ))
        .unwrap();
        let entry = |from, to| RenderTreeEdit::PermutationListEntry {
            sibling_index: from,
            move_to_sibling_index: to,
        };
        tree.apply(&batch(
            vec![entry(0, 2), entry(1, 0), entry(2, 1), RenderTreeEdit::PermutationListEnd],
            vec![],
        ))
        .unwrap();
        assert_eq!(tree.to_html(ComponentId(0)).unwrap(), "bca");
    }

    #[test]
    fn test_bad_permutation_rejected() {
        let mut siblings = vec![UiNode::Text("a".into()), UiNode::Text("b".into())];
        assert_eq!(
            apply_permutation(&mut siblings, &[(0, 1), (1, 1)]),
            Err(ApplyError::InvalidPermutation)
        );
    }

    #[test]
    fn test_nested_components_and_disposal() {
        let mut tree = UiTree::new();
        let mut first = batch(
            vec![prepend(0, 0)],
            vec![FrameSnapshot::Component {
                subtree_length: 1,
                component_id: Some(ComponentId(1)),
            }],
        );
        first.updated_components.push(DiffSnapshot {
            component_id: ComponentId(1),
            edits: vec![prepend(0, 1)],
        });
        first.reference_frames.push(text("child"));
        tree.apply(&first).unwrap();
        assert_eq!(tree.to_html(ComponentId(0)).unwrap(), "child");

        let mut second = batch(vec![RenderTreeEdit::RemoveFrame { sibling_index: 0 }], vec![]);
        second.disposed_component_ids.push(ComponentId(1));
        tree.apply(&second).unwrap();
        assert!(!tree.contains(ComponentId(1)));
        assert_eq!(tree.to_html(ComponentId(0)).unwrap(), "");
    }

    #[test]
    fn test_out_of_range_edits_are_errors() {
        let mut tree = UiTree::new();
        let err = tree
            .apply(&batch(vec![RenderTreeEdit::RemoveFrame { sibling_index: 0 }], vec![]))
            .unwrap_err();
        assert_eq!(err, ApplyError::SiblingOutOfRange { index: 0, len: 0 });
        assert_eq!(
            tree.apply(&batch(vec![RenderTreeEdit::StepOut], vec![])),
            Err(ApplyError::UnbalancedStepOut)
        );
    }
}
