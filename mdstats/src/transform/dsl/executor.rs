//! Stylesheet executor
//!
//! Compiles a [`Stylesheet`] once (paths, names and regexes) and applies it
//! to trees. Application never panics: misuse is reported as an
//! [`ApplyError`].

use regex::Regex;
use std::collections::HashMap;

use super::operations::{map_value, normalize_space, Operation};
use super::stylesheet::Stylesheet;
use crate::error::{ApplyError, StylesheetError};
use crate::tree::{Attribute, Element, Handle, Namespaces, Node, QName};
use crate::xpath::XPath;

/// A stylesheet ready to apply.
#[derive(Debug, Clone)]
pub struct CompiledStylesheet {
    rules: Vec<CompiledRule>,
}

#[derive(Debug, Clone)]
struct CompiledRule {
    path: XPath,
    required: bool,
    message: Option<String>,
    actions: Vec<Action>,
}

#[derive(Debug, Clone)]
enum Action {
    Remove,
    Rename(QName),
    SetAttribute(QName, String),
    RemoveAttribute(QName),
    SortAttributes,
    SortChildren,
    StripWhitespace,
    Text(TextEdit),
    Unwrap,
    Wrap(QName),
    RemapNamespace {
        from: String,
        to: String,
        prefix: Option<String>,
    },
    Fail(String),
}

#[derive(Debug, Clone)]
enum TextEdit {
    Trim,
    NormalizeSpace,
    Uppercase,
    Lowercase,
    Replace(Regex, String),
    Map {
        mapping: HashMap<String, String>,
        case_insensitive: bool,
        default_unmapped: Option<String>,
    },
    Set(String),
}

impl TextEdit {
    fn apply(&self, value: &str) -> String {
        match self {
            TextEdit::Trim => value.trim().to_string(),
            TextEdit::NormalizeSpace => normalize_space(value),
            TextEdit::Uppercase => value.to_uppercase(),
            TextEdit::Lowercase => value.to_lowercase(),
            TextEdit::Replace(re, replacement) => re.replace_all(value, replacement.as_str()).into_owned(),
            TextEdit::Map {
                mapping,
                case_insensitive,
                default_unmapped,
            } => map_value(value, mapping, *case_insensitive, default_unmapped.as_deref()),
            TextEdit::Set(text) => text.clone(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            TextEdit::Trim => "trim",
            TextEdit::NormalizeSpace => "normalize_space",
            TextEdit::Uppercase => "uppercase",
            TextEdit::Lowercase => "lowercase",
            TextEdit::Replace(..) => "replace",
            TextEdit::Map { .. } => "map",
            TextEdit::Set(_) => "set_text",
        }
    }
}

// =============================================================================
// Compilation
// =============================================================================

impl CompiledStylesheet {
    /// Compile every rule; rules are numbered from 1 in errors
    pub fn compile(stylesheet: &Stylesheet, vocabulary: &Namespaces) -> Result<Self, StylesheetError> {
        let namespaces = vocabulary.merged(&stylesheet.namespaces);
        let mut rules = Vec::with_capacity(stylesheet.rules.len());

        for (index, rule) in stylesheet.rules.iter().enumerate() {
            let number = index + 1;
            let path = XPath::compile(&rule.path, &namespaces)
                .map_err(|source| StylesheetError::Path { rule: number, source })?;

            if rule.operations.is_empty() && !rule.required {
                return Err(StylesheetError::InvalidRule {
                    rule: number,
                    message: "rule has no operations and is not required".to_string(),
                });
            }

            let actions = rule
                .operations
                .iter()
                .map(|op| compile_operation(op, number, &namespaces))
                .collect::<Result<Vec<_>, _>>()?;

            rules.push(CompiledRule {
                path,
                required: rule.required,
                message: rule.message.clone(),
                actions,
            });
        }

        Ok(Self { rules })
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

fn resolve_name(name: &str, rule: usize, namespaces: &Namespaces) -> Result<QName, StylesheetError> {
    let name = name.trim();
    if name.is_empty() || name.ends_with(':') {
        return Err(StylesheetError::InvalidRule {
            rule,
            message: format!("invalid name '{}'", name),
        });
    }
    namespaces.resolve_qname(name).ok_or_else(|| StylesheetError::UndefinedPrefix {
        rule,
        name: name.to_string(),
    })
}

fn resolve_namespace(value: &str, rule: usize, namespaces: &Namespaces) -> Result<String, StylesheetError> {
    namespaces
        .resolve_namespace(value)
        .map(String::from)
        .ok_or_else(|| StylesheetError::UndefinedPrefix {
            rule,
            name: value.to_string(),
        })
}

fn compile_operation(op: &Operation, rule: usize, namespaces: &Namespaces) -> Result<Action, StylesheetError> {
    Ok(match op {
        Operation::Remove => Action::Remove,
        Operation::Rename { name } => Action::Rename(resolve_name(name, rule, namespaces)?),
        Operation::SetAttribute { name, value } => {
            Action::SetAttribute(resolve_name(name, rule, namespaces)?, value.clone())
        }
        Operation::RemoveAttribute { name } => Action::RemoveAttribute(resolve_name(name, rule, namespaces)?),
        Operation::SortAttributes => Action::SortAttributes,
        Operation::SortChildren => Action::SortChildren,
        Operation::StripWhitespace => Action::StripWhitespace,
        Operation::Trim => Action::Text(TextEdit::Trim),
        Operation::NormalizeSpace => Action::Text(TextEdit::NormalizeSpace),
        Operation::Uppercase => Action::Text(TextEdit::Uppercase),
        Operation::Lowercase => Action::Text(TextEdit::Lowercase),
        Operation::Replace { pattern, value } => {
            let re = Regex::new(pattern).map_err(|e| StylesheetError::Regex {
                rule,
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
            Action::Text(TextEdit::Replace(re, value.clone()))
        }
        Operation::Map {
            mapping,
            case_insensitive,
            default_unmapped,
        } => Action::Text(TextEdit::Map {
            mapping: mapping.clone(),
            case_insensitive: *case_insensitive,
            default_unmapped: default_unmapped.clone(),
        }),
        Operation::SetText { value } => Action::Text(TextEdit::Set(value.clone())),
        Operation::Unwrap => Action::Unwrap,
        Operation::Wrap { name } => Action::Wrap(resolve_name(name, rule, namespaces)?),
        Operation::RemapNamespace { from, to } => {
            let from_uri = resolve_namespace(from, rule, namespaces)?;
            let to_uri = resolve_namespace(to, rule, namespaces)?;
            let prefix = match namespaces.get(to) {
                Some(_) => Some(to.clone()),
                None => namespaces.prefix_for(&to_uri).map(String::from),
            };
            Action::RemapNamespace {
                from: from_uri,
                to: to_uri,
                prefix,
            }
        }
        Operation::Fail { message } => Action::Fail(message.clone()),
    })
}

// =============================================================================
// Application
// =============================================================================

impl CompiledStylesheet {
    /// Apply all rules to a copy of `root`.
    ///
    /// Within a rule, matches are rewritten in reverse document order so that
    /// an operation never invalidates a match still waiting its turn.
    pub fn apply(&self, root: &Element) -> Result<Element, ApplyError> {
        let mut tree = root.clone();

        for rule in &self.rules {
            let matches = rule.path.select(&tree)?;
            if matches.is_empty() {
                if rule.required {
                    return Err(ApplyError::RequiredMatch {
                        path: rule.path.source().to_string(),
                        message: rule
                            .message
                            .clone()
                            .unwrap_or_else(|| format!("required match '{}' not found", rule.path)),
                    });
                }
                continue;
            }

            for handle in matches.into_iter().rev() {
                let mut current = Some(handle);
                for action in &rule.actions {
                    match current {
                        Some(handle) => current = action.apply(&mut tree, handle)?,
                        None => break,
                    }
                }
            }
        }

        Ok(tree)
    }
}

/// Mutable view of the node behind a handle
enum Target<'a> {
    Document,
    Element(&'a mut Element),
    Text(&'a mut String),
    Attribute(&'a mut Attribute),
}

impl Target<'_> {
    fn kind(&self) -> &'static str {
        match self {
            Target::Document => "the document node",
            Target::Element(_) => "an element",
            Target::Text(_) => "a text node",
            Target::Attribute(_) => "an attribute",
        }
    }
}

fn resolve_mut<'a>(tree: &'a mut Element, handle: &Handle) -> Option<Target<'a>> {
    match handle {
        Handle::Document => Some(Target::Document),
        Handle::Node(path) => match path.split_last() {
            None => Some(Target::Element(tree)),
            Some((last, parent)) => match tree.element_at_mut(parent)?.children.get_mut(*last)? {
                Node::Element(e) => Some(Target::Element(e)),
                Node::Text(t) => Some(Target::Text(t)),
            },
        },
        Handle::Attribute(path, index) => tree
            .element_at_mut(path)?
            .attributes
            .get_mut(*index)
            .map(Target::Attribute),
    }
}

impl Action {
    fn name(&self) -> &'static str {
        match self {
            Action::Remove => "remove",
            Action::Rename(_) => "rename",
            Action::SetAttribute(..) => "set_attribute",
            Action::RemoveAttribute(_) => "remove_attribute",
            Action::SortAttributes => "sort_attributes",
            Action::SortChildren => "sort_children",
            Action::StripWhitespace => "strip_whitespace",
            Action::Text(edit) => edit.name(),
            Action::Unwrap => "unwrap",
            Action::Wrap(_) => "wrap",
            Action::RemapNamespace { .. } => "remap_namespace",
            Action::Fail(_) => "fail",
        }
    }

    fn unsupported(&self, target: &Target<'_>) -> ApplyError {
        ApplyError::Unsupported {
            operation: self.name(),
            node: target.kind(),
        }
    }

    /// Apply to the node at `handle`.
    ///
    /// Returns where the node lives afterwards, or `None` once it is gone.
    /// Dangling handles are skipped.
    fn apply(&self, tree: &mut Element, handle: Handle) -> Result<Option<Handle>, ApplyError> {
        match self {
            Action::Fail(message) => Err(ApplyError::Failed(message.clone())),
            Action::Remove => self.remove(tree, handle),
            Action::Unwrap => self.unwrap(tree, handle),
            Action::Wrap(name) => self.wrap(tree, handle, name),
            Action::Rename(name) => {
                if let Handle::Attribute(path, index) = &handle {
                    return Ok(rename_attribute(tree, path, *index, name));
                }
                match resolve_mut(tree, &handle) {
                    Some(Target::Element(e)) => e.name = name.clone(),
                    Some(other) => return Err(self.unsupported(&other)),
                    None => return Ok(None),
                }
                Ok(Some(handle))
            }
            _ => {
                let Some(target) = resolve_mut(tree, &handle) else {
                    return Ok(None);
                };
                self.edit(target)?;
                Ok(Some(handle))
            }
        }
    }

    /// In-place edits that never move the node
    fn edit(&self, target: Target<'_>) -> Result<(), ApplyError> {
        match (self, target) {
            (Action::SetAttribute(name, value), Target::Element(e)) => e.set_attribute(name.clone(), value.clone()),
            (Action::RemoveAttribute(name), Target::Element(e)) => {
                e.remove_attribute(name);
            }
            (Action::SortAttributes, Target::Element(e)) => e.attributes.sort_by(|a, b| a.name.cmp(&b.name)),
            (Action::SortChildren, Target::Element(e)) => sort_children(e),
            (Action::StripWhitespace, Target::Element(e)) => e.strip_blank_text(),
            (Action::Text(edit), Target::Element(e)) => edit_element_text(e, edit),
            (Action::Text(edit), Target::Text(t)) => *t = edit.apply(t),
            (Action::Text(edit), Target::Attribute(a)) => a.value = edit.apply(&a.value),
            (Action::RemapNamespace { from, to, prefix }, Target::Element(e)) => {
                remap_element(e, from, to, prefix.as_deref())
            }
            (Action::RemapNamespace { from, to, prefix }, Target::Attribute(a)) => {
                remap_name(&mut a.name, from, to, prefix.as_deref())
            }
            (action, target) => return Err(action.unsupported(&target)),
        }
        Ok(())
    }

    fn remove(&self, tree: &mut Element, handle: Handle) -> Result<Option<Handle>, ApplyError> {
        match &handle {
            Handle::Document => Err(self.unsupported(&Target::Document)),
            Handle::Node(path) if path.is_empty() => Err(ApplyError::Root("remove")),
            _ => {
                tree.detach(&handle);
                Ok(None)
            }
        }
    }

    fn unwrap(&self, tree: &mut Element, handle: Handle) -> Result<Option<Handle>, ApplyError> {
        let Handle::Node(path) = &handle else {
            return match resolve_mut(tree, &handle) {
                Some(target) => Err(self.unsupported(&target)),
                None => Ok(None),
            };
        };
        let Some((&last, parent_path)) = path.split_last() else {
            return Err(ApplyError::Root("unwrap"));
        };
        let Some(parent) = tree.element_at_mut(parent_path) else {
            return Ok(None);
        };

        match parent.children.get(last) {
            Some(Node::Element(_)) => {}
            Some(Node::Text(_)) => {
                return Err(ApplyError::Unsupported {
                    operation: self.name(),
                    node: "a text node",
                })
            }
            None => return Ok(None),
        }

        if let Node::Element(element) = parent.children.remove(last) {
            let tail = parent.children.split_off(last);
            parent.children.extend(element.children);
            parent.children.extend(tail);
        }
        Ok(None)
    }

    fn wrap(&self, tree: &mut Element, handle: Handle, name: &QName) -> Result<Option<Handle>, ApplyError> {
        let Handle::Node(path) = &handle else {
            return match resolve_mut(tree, &handle) {
                Some(target) => Err(self.unsupported(&target)),
                None => Ok(None),
            };
        };

        let Some((&last, parent_path)) = path.split_last() else {
            // A forest is wrapped as a whole; a real root is replaced
            if tree.is_synthetic() {
                let mut wrapper = Element::new(name.clone());
                wrapper.children = std::mem::take(&mut tree.children);
                tree.children.push(Node::Element(wrapper));
                return Ok(Some(Handle::root()));
            }
            let old = std::mem::replace(tree, Element::new(name.clone()));
            tree.children.push(Node::Element(old));
            return Ok(Some(Handle::Node(vec![0])));
        };

        let Some(parent) = tree.element_at_mut(parent_path) else {
            return Ok(None);
        };
        let Some(slot) = parent.children.get_mut(last) else {
            return Ok(None);
        };
        let mut wrapper = Element::new(name.clone());
        wrapper.children.push(std::mem::replace(slot, Node::Text(String::new())));
        *slot = Node::Element(wrapper);

        let mut moved = path.clone();
        moved.push(0);
        Ok(Some(Handle::Node(moved)))
    }
}

fn rename_attribute(tree: &mut Element, path: &[usize], index: usize, name: &QName) -> Option<Handle> {
    let owner = tree.element_at_mut(path)?;
    if index >= owner.attributes.len() {
        return None;
    }
    let clash = owner
        .attributes
        .iter()
        .enumerate()
        .position(|(i, a)| i != index && a.name == *name);
    owner.attributes[index].name = name.clone();

    let index = match clash {
        Some(other) => {
            owner.attributes.remove(other);
            if other < index {
                index - 1
            } else {
                index
            }
        }
        None => index,
    };
    Some(Handle::Attribute(path.to_vec(), index))
}

/// Stable-sort child elements by name. Whitespace-only text is dropped and
/// other text is kept ahead of the elements.
fn sort_children(element: &mut Element) {
    let mut texts = Vec::new();
    let mut elements = Vec::new();
    for child in std::mem::take(&mut element.children) {
        match child {
            Node::Element(e) => elements.push(e),
            Node::Text(t) if t.trim().is_empty() => {}
            text => texts.push(text),
        }
    }
    elements.sort_by(|a, b| a.name.cmp(&b.name));
    element.children = texts;
    element.children.extend(elements.into_iter().map(Node::Element));
}

fn edit_element_text(element: &mut Element, edit: &TextEdit) {
    if let TextEdit::Set(text) = edit {
        element.children.clear();
        if !text.is_empty() {
            element.children.push(Node::Text(text.clone()));
        }
        return;
    }
    for child in &mut element.children {
        if let Node::Text(t) = child {
            *t = edit.apply(t);
        }
    }
    element.children.retain(|c| !matches!(c, Node::Text(t) if t.is_empty()));
}

fn remap_name(name: &mut QName, from: &str, to: &str, prefix: Option<&str>) {
    if name.namespace.as_deref() == Some(from) {
        name.namespace = Some(to.to_string());
        if let Some(prefix) = prefix {
            name.prefix = Some(prefix.to_string());
        }
    }
}

fn remap_element(element: &mut Element, from: &str, to: &str, prefix: Option<&str>) {
    remap_name(&mut element.name, from, to, prefix);
    for attr in &mut element.attributes {
        remap_name(&mut attr.name, from, to, prefix);
    }
    for child in &mut element.children {
        if let Node::Element(e) = child {
            remap_element(e, from, to, prefix);
        }
    }
}
