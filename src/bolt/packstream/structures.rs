//! Typed views over the graph structures a server streams in RECORDs.
//!
//! Bolt 5.0 added string element ids as a trailing field on nodes and
//! relationships; earlier servers send the short form. Both shapes are
//! accepted, with the element id defaulting to empty.

use std::collections::HashMap;

use super::value::{Structure, Value};
use super::PackStreamError;

/// Structure tag for a node (`'N'`).
pub const NODE: u8 = 0x4E;
/// Structure tag for a relationship (`'R'`).
pub const RELATIONSHIP: u8 = 0x52;
/// Structure tag for a relationship without endpoints (`'r'`).
pub const UNBOUND_RELATIONSHIP: u8 = 0x72;
/// Structure tag for a path (`'P'`).
pub const PATH: u8 = 0x50;

/// A graph node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Server-assigned numeric id.
    pub id: i64,
    /// Node labels.
    pub labels: Vec<String>,
    /// Property map.
    pub properties: HashMap<String, Value>,
    /// Element id (5.0+; empty on older servers).
    pub element_id: String,
}

impl Node {
    /// Interpret a structure as a node.
    pub fn from_structure(s: &Structure) -> Result<Self, PackStreamError> {
        if s.tag != NODE {
            return Err(PackStreamError::InvalidStructure(format!(
                "expected node tag 0x{NODE:02X}, got 0x{:02X}",
                s.tag
            )));
        }
        if s.len() < 3 {
            return Err(PackStreamError::InvalidStructure(
                "node needs id, labels and properties".into(),
            ));
        }
        Ok(Self {
            id: require_int(s.field(0), "node id")?,
            labels: require_string_list(s.field(1), "node labels")?,
            properties: require_map(s.field(2), "node properties")?,
            element_id: optional_string(s.field(3)),
        })
    }
}

/// A relationship between two nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    /// Server-assigned numeric id.
    pub id: i64,
    /// Id of the start node.
    pub start_node_id: i64,
    /// Id of the end node.
    pub end_node_id: i64,
    /// Relationship type name.
    pub rel_type: String,
    /// Property map.
    pub properties: HashMap<String, Value>,
    /// Element id (5.0+; empty on older servers).
    pub element_id: String,
}

impl Relationship {
    /// Interpret a structure as a relationship.
    pub fn from_structure(s: &Structure) -> Result<Self, PackStreamError> {
        if s.tag != RELATIONSHIP {
            return Err(PackStreamError::InvalidStructure(format!(
                "expected relationship tag 0x{RELATIONSHIP:02X}, got 0x{:02X}",
                s.tag
            )));
        }
        if s.len() < 5 {
            return Err(PackStreamError::InvalidStructure(
                "relationship needs id, endpoints, type and properties".into(),
            ));
        }
        Ok(Self {
            id: require_int(s.field(0), "relationship id")?,
            start_node_id: require_int(s.field(1), "start node id")?,
            end_node_id: require_int(s.field(2), "end node id")?,
            rel_type: require_string(s.field(3), "relationship type")?,
            properties: require_map(s.field(4), "relationship properties")?,
            element_id: optional_string(s.field(5)),
        })
    }
}

/// A relationship stripped of its endpoints, as it appears inside a path.
#[derive(Debug, Clone, PartialEq)]
pub struct UnboundRelationship {
    /// Server-assigned numeric id.
    pub id: i64,
    /// Relationship type name.
    pub rel_type: String,
    /// Property map.
    pub properties: HashMap<String, Value>,
    /// Element id (5.0+; empty on older servers).
    pub element_id: String,
}

impl UnboundRelationship {
    /// Interpret a structure as an unbound relationship.
    pub fn from_structure(s: &Structure) -> Result<Self, PackStreamError> {
        if s.tag != UNBOUND_RELATIONSHIP {
            return Err(PackStreamError::InvalidStructure(format!(
                "expected unbound relationship tag 0x{UNBOUND_RELATIONSHIP:02X}, got 0x{:02X}",
                s.tag
            )));
        }
        if s.len() < 3 {
            return Err(PackStreamError::InvalidStructure(
                "unbound relationship needs id, type and properties".into(),
            ));
        }
        Ok(Self {
            id: require_int(s.field(0), "relationship id")?,
            rel_type: require_string(s.field(1), "relationship type")?,
            properties: require_map(s.field(2), "relationship properties")?,
            element_id: optional_string(s.field(3)),
        })
    }
}

/// An alternating node/relationship walk through the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    /// Distinct nodes visited by the path.
    pub nodes: Vec<Node>,
    /// Distinct relationships traversed.
    pub relationships: Vec<UnboundRelationship>,
    /// Alternating relationship/node indices describing the walk.
    pub indices: Vec<i64>,
}

impl Path {
    /// Interpret a structure as a path.
    pub fn from_structure(s: &Structure) -> Result<Self, PackStreamError> {
        if s.tag != PATH {
            return Err(PackStreamError::InvalidStructure(format!(
                "expected path tag 0x{PATH:02X}, got 0x{:02X}",
                s.tag
            )));
        }
        if s.len() < 3 {
            return Err(PackStreamError::InvalidStructure(
                "path needs nodes, relationships and indices".into(),
            ));
        }

        let nodes = s
            .field(0)
            .and_then(Value::as_list)
            .ok_or_else(|| PackStreamError::InvalidStructure("path nodes must be a list".into()))?
            .iter()
            .map(|v| {
                v.as_structure()
                    .ok_or_else(|| {
                        PackStreamError::InvalidStructure("path node must be a structure".into())
                    })
                    .and_then(Node::from_structure)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let relationships = s
            .field(1)
            .and_then(Value::as_list)
            .ok_or_else(|| {
                PackStreamError::InvalidStructure("path relationships must be a list".into())
            })?
            .iter()
            .map(|v| {
                v.as_structure()
                    .ok_or_else(|| {
                        PackStreamError::InvalidStructure(
                            "path relationship must be a structure".into(),
                        )
                    })
                    .and_then(UnboundRelationship::from_structure)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let indices = s
            .field(2)
            .and_then(Value::as_list)
            .ok_or_else(|| {
                PackStreamError::InvalidStructure("path indices must be a list".into())
            })?
            .iter()
            .map(|v| {
                v.as_int().ok_or_else(|| {
                    PackStreamError::InvalidStructure("path index must be an integer".into())
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            nodes,
            relationships,
            indices,
        })
    }
}

fn require_int(v: Option<&Value>, what: &str) -> Result<i64, PackStreamError> {
    v.and_then(Value::as_int)
        .ok_or_else(|| PackStreamError::InvalidStructure(format!("{what} must be an integer")))
}

fn require_string(v: Option<&Value>, what: &str) -> Result<String, PackStreamError> {
    v.and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| PackStreamError::InvalidStructure(format!("{what} must be a string")))
}

fn require_string_list(v: Option<&Value>, what: &str) -> Result<Vec<String>, PackStreamError> {
    v.and_then(Value::as_string_list)
        .ok_or_else(|| PackStreamError::InvalidStructure(format!("{what} must be a string list")))
}

fn require_map(
    v: Option<&Value>,
    what: &str,
) -> Result<HashMap<String, Value>, PackStreamError> {
    v.and_then(Value::as_map)
        .cloned()
        .ok_or_else(|| PackStreamError::InvalidStructure(format!("{what} must be a map")))
}

fn optional_string(v: Option<&Value>) -> String {
    v.and_then(Value::as_str).unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_structure(with_element_id: bool) -> Structure {
        let mut props = HashMap::new();
        props.insert("name".to_string(), Value::String("Steven".into()));
        let mut fields = vec![
            Value::Integer(18),
            Value::List(vec![Value::String("FirstNode".into())]),
            Value::Map(props),
        ];
        if with_element_id {
            fields.push(Value::String("4:abc:18".into()));
        }
        Structure::new(NODE, fields)
    }

    #[test]
    fn test_node_short_form() {
        let node = Node::from_structure(&node_structure(false)).unwrap();
        assert_eq!(node.id, 18);
        assert_eq!(node.labels, vec!["FirstNode"]);
        assert_eq!(
            node.properties.get("name").unwrap().as_str(),
            Some("Steven")
        );
        assert_eq!(node.element_id, "");
    }

    #[test]
    fn test_node_with_element_id() {
        let node = Node::from_structure(&node_structure(true)).unwrap();
        assert_eq!(node.element_id, "4:abc:18");
    }

    #[test]
    fn test_node_wrong_tag() {
        let s = Structure::new(RELATIONSHIP, vec![]);
        assert!(Node::from_structure(&s).is_err());
    }

    #[test]
    fn test_relationship() {
        let s = Structure::new(
            RELATIONSHIP,
            vec![
                Value::Integer(1),
                Value::Integer(10),
                Value::Integer(20),
                Value::String("KNOWS".into()),
                Value::Map(HashMap::new()),
            ],
        );
        let rel = Relationship::from_structure(&s).unwrap();
        assert_eq!(rel.id, 1);
        assert_eq!(rel.start_node_id, 10);
        assert_eq!(rel.end_node_id, 20);
        assert_eq!(rel.rel_type, "KNOWS");
    }

    #[test]
    fn test_path() {
        let rel = Structure::new(
            UNBOUND_RELATIONSHIP,
            vec![
                Value::Integer(5),
                Value::String("KNOWS".into()),
                Value::Map(HashMap::new()),
            ],
        );
        let s = Structure::new(
            PATH,
            vec![
                Value::List(vec![
                    Value::Structure(node_structure(false)),
                    Value::Structure(node_structure(true)),
                ]),
                Value::List(vec![Value::Structure(rel)]),
                Value::List(vec![Value::Integer(1), Value::Integer(1)]),
            ],
        );
        let path = Path::from_structure(&s).unwrap();
        assert_eq!(path.nodes.len(), 2);
        assert_eq!(path.relationships.len(), 1);
        assert_eq!(path.indices, vec![1, 1]);
    }

    #[test]
    fn test_truncated_node() {
        let s = Structure::new(NODE, vec![Value::Integer(1)]);
        assert!(Node::from_structure(&s).is_err());
    }
}
