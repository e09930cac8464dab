//! Damage pack module.
//!
//! A `Pack` is a damage message organized as a tree: a value, a mode that
//! says how the value applies to meters, a set of tags, and an ordered list
//! of sub-packs representing subordinate damage components (the fire part
//! of a flaming sword strike, say).
//!
//! Packs prune themselves. Once a pack's value reaches zero it is
//! exhausted, stays exhausted, and is removed from its parent the next time
//! the parent re-evaluates exhaustion.

use crate::error::PipelineError;
use crate::tag::{matches_filter, push_unique, Tag};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

static NEXT_PACK_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque attribution handle ("whosoever dealt it").
///
/// The pipeline never inspects the owner. Clones of a pack share it.
pub type Owner = Rc<dyn Any>;

/// Process-unique identity of a pack.
///
/// Two packs with identical contents still have different ids, so each
/// can be located and extracted on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackId(u64);

impl PackId {
    fn next() -> Self {
        PackId(NEXT_PACK_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric form of the id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pack#{}", self.0)
    }
}

/// How a pack's value is applied to a meter.
///
/// # Examples
///
/// ```rust
/// use damage_pipeline::PackMode;
///
/// assert_eq!("add".parse::<PackMode>().unwrap(), PackMode::Add);
/// assert_eq!(PackMode::parse_lenient("Set"), PackMode::Set);
/// assert_eq!(PackMode::parse_lenient("heal"), PackMode::Subtract);
/// assert_eq!(PackMode::default(), PackMode::Subtract);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PackMode {
    /// Add to meters, up to their maximum.
    Add,
    /// Set meters to the pack's value.
    Set,
    /// Subtract from meters, down to zero.
    #[default]
    Subtract,
}

impl PackMode {
    /// Numeric code of this mode: ADD = 0, SET = 1, SUBTRACT = 2.
    pub fn code(self) -> u8 {
        match self {
            PackMode::Add => 0,
            PackMode::Set => 1,
            PackMode::Subtract => 2,
        }
    }

    /// Mode for a numeric code, if the code is known.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(PackMode::Add),
            1 => Some(PackMode::Set),
            2 => Some(PackMode::Subtract),
            _ => None,
        }
    }

    /// Parse a mode name case-insensitively, falling back to `Subtract`.
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl FromStr for PackMode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ADD" => Ok(PackMode::Add),
            "SET" => Ok(PackMode::Set),
            "SUBTRACT" => Ok(PackMode::Subtract),
            _ => Err(PipelineError::UnknownMode(s.to_string())),
        }
    }
}

impl fmt::Display for PackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PackMode::Add => "ADD",
            PackMode::Set => "SET",
            PackMode::Subtract => "SUBTRACT",
        };
        f.write_str(s)
    }
}

/// Construction parameters for a [`Pack`].
///
/// # Examples
///
/// ```rust
/// use damage_pipeline::{Pack, PackMode, PackParams};
///
/// let pack = Pack::from_params(PackParams {
///     value: 12.0,
///     mode: PackMode::Add,
///     tags: vec!["heal".into()],
///     ..Default::default()
/// });
/// assert_eq!(pack.value(), 12.0);
/// assert!(pack.has_tag(&"heal".into()));
/// ```
#[derive(Default)]
pub struct PackParams {
    pub value: f64,
    pub mode: PackMode,
    pub owner: Option<Owner>,
    pub tags: Vec<Tag>,
    pub sub_packs: Vec<Pack>,
}

impl From<f64> for PackParams {
    fn from(value: f64) -> Self {
        Self {
            value,
            ..Default::default()
        }
    }
}

/// A tree-structured damage message.
///
/// # Examples
///
/// ```rust
/// use damage_pipeline::Pack;
///
/// let mut strike = Pack::new(10.0)
///     .with_tag("physical")
///     .with_sub_pack(Pack::new(4.0).with_tag("fire"));
///
/// // Children come first, the pack itself last.
/// let order: Vec<f64> = strike.all_packs().iter().map(|p| p.value()).collect();
/// assert_eq!(order, vec![4.0, 10.0]);
///
/// // An exhausted fire component is pruned when the parent re-evaluates.
/// let fire = strike.sub_packs()[0].id();
/// strike.find_mut(fire).unwrap().set_value(0.0);
/// strike.check_exhaustion();
/// assert!(strike.sub_packs().is_empty());
/// ```
pub struct Pack {
    id: PackId,
    value: f64,
    mode: PackMode,
    owner: Option<Owner>,
    tags: Vec<Tag>,
    sub_packs: Vec<Pack>,
    exhausted: bool,
}

impl Pack {
    /// Create a subtracting pack with the given value and nothing else.
    pub fn new(value: f64) -> Self {
        Self::from_params(PackParams::from(value))
    }

    /// Create a pack from a parameter struct, sanitizing it.
    ///
    /// A NaN value becomes 0. A value of 0 or less exhausts the pack
    /// immediately. Duplicate tags are dropped, as are exhausted sub-packs.
    pub fn from_params(params: PackParams) -> Self {
        let mut pack = Self {
            id: PackId::next(),
            value: 0.0,
            mode: params.mode,
            owner: params.owner,
            tags: Vec::new(),
            sub_packs: params.sub_packs,
            exhausted: false,
        };
        for tag in params.tags {
            push_unique(&mut pack.tags, tag);
        }
        pack.set_value(params.value);
        pack
    }

    /// Build a pack from an untyped JSON description.
    ///
    /// Accepts a bare number (shorthand for `{"value": n}`) or an object
    /// with optional `value`, `mode`, `tags` and `subPacks` (or
    /// `sub_packs`) fields. Invalid parts are dropped with a diagnostic;
    /// construction never fails.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use damage_pipeline::{Pack, PackMode};
    /// use serde_json::json;
    ///
    /// let pack = Pack::from_json(&json!({
    ///     "value": 20,
    ///     "mode": "add",
    ///     "tags": ["holy", 3, false],
    ///     "subPacks": [5, {"value": 2, "tags": "fire"}, "junk"]
    /// }));
    /// assert_eq!(pack.mode(), PackMode::Add);
    /// assert_eq!(pack.tags().len(), 2);
    /// assert_eq!(pack.sub_packs().len(), 2);
    /// ```
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Number(n) => Pack::new(n.as_f64().unwrap_or(0.0)),
            Value::Object(map) => {
                let value = map.get("value").and_then(Value::as_f64).unwrap_or(0.0);
                let mode = map.get("mode").map(mode_from_json).unwrap_or_default();
                let tags = map.get("tags").map(Tag::list_from_json).unwrap_or_default();
                let sub_packs = map
                    .get("subPacks")
                    .or_else(|| map.get("sub_packs"))
                    .map(sub_packs_from_json)
                    .unwrap_or_default();
                Pack::from_params(PackParams {
                    value,
                    mode,
                    owner: None,
                    tags,
                    sub_packs,
                })
            }
            other => {
                warn!(input = %other, "Invalid pack description; using an exhausted pack");
                Pack::new(0.0)
            }
        }
    }

    /// Set the mode (builder style).
    pub fn with_mode(mut self, mode: PackMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the owner (builder style).
    pub fn with_owner(mut self, owner: Owner) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Add a tag (builder style).
    pub fn with_tag(mut self, tag: impl Into<Tag>) -> Self {
        self.add_tag(tag);
        self
    }

    /// Append a sub-pack (builder style).
    pub fn with_sub_pack(mut self, pack: Pack) -> Self {
        self.add_sub_pack(pack);
        self
    }

    pub fn id(&self) -> PackId {
        self.id
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Assign a new value and re-evaluate exhaustion across the subtree.
    ///
    /// An exhausted pack is inert: assigning to it leaves it at 0.
    /// Returns the exhaustion state afterwards.
    pub fn set_value(&mut self, value: f64) -> bool {
        if !self.exhausted {
            self.value = if value.is_nan() { 0.0 } else { value };
        }
        self.check_exhaustion()
    }

    /// Subtract `amount` from the value. Shorthand for `set_value`.
    pub fn reduce(&mut self, amount: f64) -> bool {
        self.set_value(self.value - amount)
    }

    pub fn mode(&self) -> PackMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: PackMode) {
        self.mode = mode;
    }

    pub fn owner(&self) -> Option<&Owner> {
        self.owner.as_ref()
    }

    /// Downcast the owner to a concrete type.
    pub fn owner_as<T: 'static>(&self) -> Option<&T> {
        self.owner.as_ref().and_then(|owner| owner.downcast_ref::<T>())
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Add a tag unless already present. Returns `true` if it was added.
    pub fn add_tag(&mut self, tag: impl Into<Tag>) -> bool {
        push_unique(&mut self.tags, tag.into())
    }

    /// Remove a tag. Returns `true` if it was present.
    pub fn remove_tag(&mut self, tag: &Tag) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| t != tag);
        self.tags.len() != before
    }

    pub fn sub_packs(&self) -> &[Pack] {
        &self.sub_packs
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Append a sub-pack, typically one moved out with
    /// [`extract_sub_pack`](Self::extract_sub_pack).
    ///
    /// Exhausted packs are inert and are not attached. Returns `true` if
    /// the pack was attached.
    pub fn add_sub_pack(&mut self, pack: Pack) -> bool {
        if pack.is_exhausted() {
            return false;
        }
        self.sub_packs.push(pack);
        true
    }

    /// Check exhaustion on this pack and prune exhausted sub-packs.
    ///
    /// Call this after any mutation that could change the tree's
    /// exhaustion status. Returns the current exhaustion state.
    pub fn check_exhaustion(&mut self) -> bool {
        if self.value <= 0.0 {
            self.value = 0.0;
            self.exhausted = true;
        }
        self.discard_exhausted_sub_packs();
        self.exhausted
    }

    /// Remove every exhausted pack below this one.
    ///
    /// Works post-order: each child's subtree is pruned before the child
    /// itself is tested. Normally runs as part of `check_exhaustion`.
    pub fn discard_exhausted_sub_packs(&mut self) {
        for sub_pack in &mut self.sub_packs {
            sub_pack.discard_exhausted_sub_packs();
        }
        self.sub_packs.retain(|p| !p.exhausted);
    }

    /// Detach a pack from anywhere below this one.
    ///
    /// Direct children are searched first, then each child's subtree in
    /// order. Returns `None` when the pack is not in this tree; a pack
    /// never finds itself.
    pub fn extract_sub_pack(&mut self, id: PackId) -> Option<Pack> {
        if let Some(index) = self.sub_packs.iter().position(|p| p.id == id) {
            return Some(self.sub_packs.remove(index));
        }
        self.sub_packs
            .iter_mut()
            .find_map(|sub_pack| sub_pack.extract_sub_pack(id))
    }

    /// Locate a pack in this tree, including this pack itself.
    pub fn find(&self, id: PackId) -> Option<&Pack> {
        if self.id == id {
            return Some(self);
        }
        self.sub_packs.iter().find_map(|p| p.find(id))
    }

    /// Mutable variant of [`find`](Self::find).
    pub fn find_mut(&mut self, id: PackId) -> Option<&mut Pack> {
        if self.id == id {
            return Some(self);
        }
        self.sub_packs.iter_mut().find_map(|p| p.find_mut(id))
    }

    /// Whether a pack with this id is part of this tree.
    pub fn contains(&self, id: PackId) -> bool {
        self.find(id).is_some()
    }

    /// This pack and all descendants in post-order.
    ///
    /// Children are enumerated depth-first, left to right, and this pack
    /// is always the final element, so processing in order handles the
    /// deepest packs first and the root last.
    pub fn all_packs(&self) -> Vec<&Pack> {
        let mut packs = Vec::new();
        self.collect_post_order(&mut packs);
        packs
    }

    /// Ids of [`all_packs`](Self::all_packs), in the same order.
    pub fn all_pack_ids(&self) -> Vec<PackId> {
        self.all_packs().into_iter().map(|p| p.id).collect()
    }

    fn collect_post_order<'a>(&'a self, out: &mut Vec<&'a Pack>) {
        for sub_pack in &self.sub_packs {
            sub_pack.collect_post_order(out);
        }
        out.push(self);
    }

    /// Sum of values across this pack and all descendants.
    pub fn total_value(&self) -> f64 {
        self.value + self.sub_packs.iter().map(Pack::total_value).sum::<f64>()
    }

    pub fn has_tag(&self, tag: &Tag) -> bool {
        self.tags.contains(tag)
    }

    /// Whether this pack carries any tag from `tags`.
    ///
    /// An empty list matches every pack, including untagged ones.
    pub fn has_tag_in(&self, tags: &[Tag]) -> bool {
        matches_filter(&self.tags, tags)
    }
}

impl Clone for Pack {
    /// Deep copy with fresh ids throughout. The owner is shared.
    fn clone(&self) -> Self {
        Self {
            id: PackId::next(),
            value: self.value,
            mode: self.mode,
            owner: self.owner.clone(),
            tags: self.tags.clone(),
            sub_packs: self.sub_packs.clone(),
            exhausted: self.exhausted,
        }
    }
}

impl fmt::Debug for Pack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pack")
            .field("id", &self.id)
            .field("value", &self.value)
            .field("mode", &self.mode)
            .field("owner", &self.owner.as_ref().map(|_| "<owner>"))
            .field("tags", &self.tags)
            .field("sub_packs", &self.sub_packs)
            .field("exhausted", &self.exhausted)
            .finish()
    }
}

impl From<f64> for Pack {
    fn from(value: f64) -> Self {
        Pack::new(value)
    }
}

fn mode_from_json(value: &Value) -> PackMode {
    match value {
        Value::String(s) => PackMode::parse_lenient(s),
        Value::Number(n) => n
            .as_u64()
            .and_then(|code| u8::try_from(code).ok())
            .and_then(PackMode::from_code)
            .unwrap_or_default(),
        _ => PackMode::default(),
    }
}

fn sub_packs_from_json(value: &Value) -> Vec<Pack> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::Object(_) | Value::Number(_) => Some(Pack::from_json(item)),
                other => {
                    warn!(input = %other, "Invalid component in sub-pack list");
                    None
                }
            })
            .collect(),
        Value::Object(_) => vec![Pack::from_json(value)],
        other => {
            warn!(input = %other, "Invalid sub-pack input; discarding");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn leaf(value: f64) -> Pack {
        Pack::new(value)
    }

    #[test]
    fn test_zero_value_is_exhausted() {
        let pack = Pack::new(0.0);
        assert!(pack.is_exhausted());
        assert_eq!(pack.value(), 0.0);
    }

    #[test]
    fn test_negative_value_clamped() {
        let mut pack = Pack::new(5.0);
        assert!(pack.set_value(-3.0));
        assert_eq!(pack.value(), 0.0);
    }

    #[test]
    fn test_nan_value_sanitized() {
        let pack = Pack::new(f64::NAN);
        assert_eq!(pack.value(), 0.0);
        assert!(pack.is_exhausted());
    }

    #[test]
    fn test_exhaustion_is_monotonic() {
        let mut pack = Pack::new(3.0);
        pack.set_value(0.0);
        pack.set_value(10.0);
        assert!(pack.is_exhausted());
        assert_eq!(pack.value(), 0.0);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(PackMode::parse_lenient("aDd"), PackMode::Add);
        assert_eq!(PackMode::parse_lenient("SET"), PackMode::Set);
        assert_eq!(PackMode::parse_lenient("subtract"), PackMode::Subtract);
        assert_eq!(PackMode::parse_lenient("heal"), PackMode::Subtract);
        assert!("bogus".parse::<PackMode>().is_err());
    }

    #[test]
    fn test_tags_deduplicated() {
        let pack = Pack::from_params(PackParams {
            value: 1.0,
            tags: vec!["fire".into(), 2.into(), "fire".into()],
            ..Default::default()
        });
        assert_eq!(pack.tags(), &[Tag::name("fire"), Tag::Number(2)]);
    }

    #[test]
    fn test_all_packs_post_order() {
        let a = leaf(1.0);
        let b = leaf(2.0);
        let (a_id, b_id) = (a.id(), b.id());
        let root = Pack::new(3.0).with_sub_pack(a).with_sub_pack(b);
        assert_eq!(root.all_pack_ids(), vec![a_id, b_id, root.id()]);
    }

    #[test]
    fn test_all_packs_nested_post_order() {
        let grandchild = leaf(1.0);
        let gc_id = grandchild.id();
        let child = leaf(2.0).with_sub_pack(grandchild);
        let c_id = child.id();
        let sibling = leaf(3.0);
        let s_id = sibling.id();
        let root = Pack::new(4.0).with_sub_pack(child).with_sub_pack(sibling);
        assert_eq!(root.all_pack_ids(), vec![gc_id, c_id, s_id, root.id()]);
    }

    #[test]
    fn test_setting_value_prunes_exhausted_descendants() {
        let mut root = Pack::new(10.0).with_sub_pack(leaf(1.0).with_sub_pack(leaf(1.0)));
        let child_id = root.sub_packs()[0].id();
        let grandchild_id = root.sub_packs()[0].sub_packs()[0].id();

        root.find_mut(grandchild_id).unwrap().set_value(0.0);
        assert!(root.contains(grandchild_id));
        root.set_value(9.0);
        assert!(!root.contains(grandchild_id));
        assert!(root.contains(child_id));

        root.find_mut(child_id).unwrap().set_value(0.0);
        root.set_value(8.0);
        assert!(root.sub_packs().is_empty());
    }

    #[test]
    fn test_extract_sub_pack_by_identity() {
        let twin_a = leaf(5.0);
        let twin_b = leaf(5.0);
        let b_id = twin_b.id();
        let mut root = Pack::new(1.0).with_sub_pack(twin_a).with_sub_pack(leaf(2.0).with_sub_pack(twin_b));

        let extracted = root.extract_sub_pack(b_id).unwrap();
        assert_eq!(extracted.id(), b_id);
        assert!(!root.contains(b_id));
        assert_eq!(root.sub_packs()[0].value(), 5.0);
        assert!(root.extract_sub_pack(b_id).is_none());
    }

    #[test]
    fn test_extract_self_not_found() {
        let mut root = Pack::new(1.0);
        let id = root.id();
        assert!(root.extract_sub_pack(id).is_none());
    }

    #[test]
    fn test_has_tag_in_empty_is_true() {
        let untagged = Pack::new(1.0);
        assert!(untagged.has_tag_in(&[]));
        assert!(!untagged.has_tag_in(&[Tag::name("fire")]));
        let tagged = Pack::new(1.0).with_tag("ice").with_tag(7);
        assert!(tagged.has_tag_in(&[Tag::name("fire"), Tag::Number(7)]));
    }

    #[test]
    fn test_clone_is_independent() {
        let owner: Owner = Rc::new(String::from("goblin"));
        let original = Pack::new(10.0)
            .with_owner(owner.clone())
            .with_tag("fire")
            .with_sub_pack(leaf(3.0));
        let mut copy = original.clone();

        assert_ne!(copy.id(), original.id());
        assert_ne!(copy.sub_packs()[0].id(), original.sub_packs()[0].id());
        assert!(Rc::ptr_eq(copy.owner().unwrap(), &owner));

        copy.set_value(1.0);
        copy.add_tag("ice");
        let sub_id = copy.sub_packs()[0].id();
        copy.extract_sub_pack(sub_id);

        assert_eq!(original.value(), 10.0);
        assert_eq!(original.tags().len(), 1);
        assert_eq!(original.sub_packs().len(), 1);
        assert_eq!(original.owner_as::<String>().map(String::as_str), Some("goblin"));
    }

    #[test]
    fn test_from_json_number_shorthand() {
        let pack = Pack::from_json(&json!(15));
        assert_eq!(pack.value(), 15.0);
        assert_eq!(pack.mode(), PackMode::Subtract);
    }

    #[test]
    fn test_from_json_sanitizes() {
        let pack = Pack::from_json(&json!({
            "value": "lots",
            "mode": 9,
            "tags": 4,
            "subPacks": "nope"
        }));
        assert!(pack.is_exhausted());
        assert_eq!(pack.mode(), PackMode::Subtract);
        assert_eq!(pack.tags(), &[Tag::Number(4)]);
        assert!(pack.sub_packs().is_empty());
    }

    #[test]
    fn test_from_json_single_sub_pack_and_codes() {
        let pack = Pack::from_json(&json!({
            "value": 4,
            "mode": 1,
            "sub_packs": {"value": 2, "mode": "ADD"}
        }));
        assert_eq!(pack.mode(), PackMode::Set);
        assert_eq!(pack.sub_packs().len(), 1);
        assert_eq!(pack.sub_packs()[0].mode(), PackMode::Add);
    }

    #[test]
    fn test_total_value() {
        let root = Pack::new(5.0).with_sub_pack(leaf(2.0).with_sub_pack(leaf(1.0)));
        assert_eq!(root.total_value(), 8.0);
    }

    #[test]
    fn test_exhausted_sub_pack_not_attached() {
        let mut root = Pack::new(5.0);
        assert!(!root.add_sub_pack(Pack::new(0.0)));
        assert!(root.sub_packs().is_empty());
    }
}
