//! Rich-text document model
//!
//! Rich-text values are JSON trees of the shape
//!
//! ```json
//! { "root": { "type": "root", "children": [
//!     { "type": "paragraph", "children": [ { "type": "text", "text": "Hello" } ] },
//!     { "type": "block", "fields": { "blockType": "text-block", "text": "..." } }
//! ] } }
//! ```
//!
//! Element nodes (anything with `children`) may nest arbitrarily. Attributes the
//! model does not interpret (`format`, `indent`, `direction`, `version`, ...)
//! are kept verbatim so a parse/serialize cycle does not lose editor state.

use serde_json::{Map, Value};

/// Error raised when a value does not have the shape of a rich-text document
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (at '{path}')")]
pub struct RichTextError {
    /// Dotted path of the offending node, relative to the document
    pub path: String,
    pub message: String,
}

impl RichTextError {
    fn new(path: &str, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

/// A parsed rich-text document
#[derive(Debug, Clone, PartialEq)]
pub struct RichTextDocument {
    pub root: ElementNode,
    /// Top-level keys other than `root`
    pub extra: Map<String, Value>,
}

/// A node of the document tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(ElementNode),
    Text(TextNode),
    Block(BlockNode),
    /// Childless nodes such as `linebreak`, `tab` or `horizontalrule`
    Leaf(LeafNode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementNode {
    pub kind: String,
    pub children: Vec<Node>,
    pub attributes: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextNode {
    pub text: String,
    pub attributes: Map<String, Value>,
}

/// An embedded block. `fields` carries `blockType`, the optional `id` and
/// `blockName`, and the block's own field values.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockNode {
    pub fields: Map<String, Value>,
    pub attributes: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeafNode {
    pub kind: String,
    pub attributes: Map<String, Value>,
}

impl BlockNode {
    pub fn block_type(&self) -> Option<&str> {
        self.fields.get("blockType").and_then(Value::as_str)
    }

    pub fn id(&self) -> Option<&str> {
        self.fields.get("id").and_then(Value::as_str)
    }
}

impl RichTextDocument {
    /// An empty document: a root holding one empty paragraph
    pub fn empty() -> Self {
        Self {
            root: ElementNode {
                kind: "root".to_string(),
                children: vec![Node::Element(ElementNode {
                    kind: "paragraph".to_string(),
                    children: Vec::new(),
                    attributes: Map::new(),
                })],
                attributes: Map::new(),
            },
            extra: Map::new(),
        }
    }

    /// Parse a JSON value into a document
    pub fn parse(value: &Value) -> Result<Self, RichTextError> {
        let obj = value
            .as_object()
            .ok_or_else(|| RichTextError::new("", "Rich text must be an object"))?;
        let root_value = obj
            .get("root")
            .ok_or_else(|| RichTextError::new("", "Rich text is missing its root node"))?;

        let root = match parse_node(root_value, "root")? {
            Node::Element(el) if el.kind == "root" => el,
            _ => {
                return Err(RichTextError::new(
                    "root",
                    "Root node must have type 'root' and children",
                ))
            }
        };

        let extra = obj
            .iter()
            .filter(|(k, _)| k.as_str() != "root")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Self { root, extra })
    }

    /// Serialize back into the JSON shape accepted by [`parse`](Self::parse)
    pub fn to_value(&self) -> Value {
        let mut obj = self.extra.clone();
        obj.insert("root".to_string(), element_to_value(&self.root));
        Value::Object(obj)
    }

    /// True when the document holds no text and no blocks
    pub fn is_empty(&self) -> bool {
        !has_content(&self.root.children)
    }

    /// False for a root without children or holding a single childless
    /// paragraph, which is what an untouched editor produces. This is the
    /// test a required rich-text field must pass.
    pub fn has_children(&self) -> bool {
        match self.root.children.as_slice() {
            [] => false,
            [Node::Element(el)] if el.kind == "paragraph" => !el.children.is_empty(),
            _ => true,
        }
    }

    /// Concatenated text of all text nodes, paragraphs separated by newlines
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        collect_text(&self.root.children, &mut out);
        out.trim_end().to_string()
    }

    /// All block nodes, depth first
    pub fn blocks(&self) -> Vec<&BlockNode> {
        let mut out = Vec::new();
        collect_blocks(&self.root.children, &mut out);
        out
    }

    /// Visit every block node mutably, with its dotted path
    pub fn for_each_block_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&str, &mut BlockNode),
    {
        visit_blocks_mut(&mut self.root.children, "root.children", &mut f);
    }
}

fn parse_node(value: &Value, path: &str) -> Result<Node, RichTextError> {
    let obj = value
        .as_object()
        .ok_or_else(|| RichTextError::new(path, "Node must be an object"))?;
    let kind = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| RichTextError::new(path, "Node is missing its type"))?;

    let attributes_without = |skip: &[&str]| -> Map<String, Value> {
        obj.iter()
            .filter(|(k, _)| k.as_str() != "type" && !skip.iter().any(|s| *s == k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    };

    match kind {
        "text" => {
            let text = obj
                .get("text")
                .and_then(Value::as_str)
                .ok_or_else(|| RichTextError::new(path, "Text node must have a string 'text'"))?;
            Ok(Node::Text(TextNode {
                text: text.to_string(),
                attributes: attributes_without(&["text"]),
            }))
        }
        "block" => {
            let fields = obj
                .get("fields")
                .and_then(Value::as_object)
                .ok_or_else(|| RichTextError::new(path, "Block node must have 'fields'"))?;
            Ok(Node::Block(BlockNode {
                fields: fields.clone(),
                attributes: attributes_without(&["fields"]),
            }))
        }
        _ => match obj.get("children") {
            Some(Value::Array(items)) => {
                let mut children = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    children.push(parse_node(item, &format!("{}.children.{}", path, i))?);
                }
                Ok(Node::Element(ElementNode {
                    kind: kind.to_string(),
                    children,
                    attributes: attributes_without(&["children"]),
                }))
            }
            Some(_) => Err(RichTextError::new(path, "'children' must be an array")),
            None => Ok(Node::Leaf(LeafNode {
                kind: kind.to_string(),
                attributes: attributes_without(&[]),
            })),
        },
    }
}

fn node_to_value(node: &Node) -> Value {
    match node {
        Node::Element(el) => element_to_value(el),
        Node::Text(text) => {
            let mut obj = text.attributes.clone();
            obj.insert("type".to_string(), Value::from("text"));
            obj.insert("text".to_string(), Value::from(text.text.clone()));
            Value::Object(obj)
        }
        Node::Block(block) => {
            let mut obj = block.attributes.clone();
            obj.insert("type".to_string(), Value::from("block"));
            obj.insert("fields".to_string(), Value::Object(block.fields.clone()));
            Value::Object(obj)
        }
        Node::Leaf(leaf) => {
            let mut obj = leaf.attributes.clone();
            obj.insert("type".to_string(), Value::from(leaf.kind.clone()));
            Value::Object(obj)
        }
    }
}

fn element_to_value(el: &ElementNode) -> Value {
    let mut obj = el.attributes.clone();
    obj.insert("type".to_string(), Value::from(el.kind.clone()));
    obj.insert(
        "children".to_string(),
        Value::Array(el.children.iter().map(node_to_value).collect()),
    );
    Value::Object(obj)
}

fn has_content(nodes: &[Node]) -> bool {
    nodes.iter().any(|node| match node {
        Node::Element(el) => has_content(&el.children),
        Node::Text(text) => !text.text.is_empty(),
        Node::Block(_) => true,
        // A bare linebreak does not make a document non-empty
        Node::Leaf(leaf) => leaf.kind != "linebreak",
    })
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Element(el) => {
                collect_text(&el.children, out);
                if matches!(
                    el.kind.as_str(),
                    "paragraph" | "heading" | "quote" | "listitem"
                ) {
                    out.push('\n');
                }
            }
            Node::Text(text) => out.push_str(&text.text),
            Node::Block(block) => {
                if let Some(text) = block.fields.get("text").and_then(Value::as_str) {
                    out.push_str(text);
                    out.push('\n');
                }
            }
            Node::Leaf(leaf) => match leaf.kind.as_str() {
                "linebreak" => out.push('\n'),
                "tab" => out.push('\t'),
                _ => {}
            },
        }
    }
}

fn collect_blocks<'a>(nodes: &'a [Node], out: &mut Vec<&'a BlockNode>) {
    for node in nodes {
        match node {
            Node::Element(el) => collect_blocks(&el.children, out),
            Node::Block(block) => out.push(block),
            _ => {}
        }
    }
}

fn visit_blocks_mut<F>(nodes: &mut [Node], path: &str, f: &mut F)
where
    F: FnMut(&str, &mut BlockNode),
{
    for (i, node) in nodes.iter_mut().enumerate() {
        let node_path = format!("{}.{}", path, i);
        match node {
            Node::Element(el) => {
                visit_blocks_mut(&mut el.children, &format!("{}.children", node_path), f)
            }
            Node::Block(block) => f(&node_path, block),
            _ => {}
        }
    }
}
