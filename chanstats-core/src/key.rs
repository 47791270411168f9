// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Identity keys for channel statistics

use std::{collections::HashMap, fmt, hash::BuildHasher, sync::Arc};

use crate::RecordError;

/// Separator placed between the encoded fields of a [`Key`]: the ASCII unit separator.
///
/// [`Key::check_tags`] only accepts printable ASCII, so no recordable field can contain it and
/// encoding is a bijection for every key that passes the check. Any printable punctuation,
/// including `#` and `|`, may appear in fields.
pub const KEY_DELIMITER: &str = "\u{1f}";

/// Number of fields making up a [`Key`]
pub const FIELD_COUNT: usize = 6;

/// Tag name of the node field
pub const TAG_NODE: &str = "node";
/// Tag name of the client id field
pub const TAG_CLIENT_ID: &str = "client_id";
/// Tag name of the channel field
pub const TAG_CHANNEL: &str = "channel";
/// Tag name of the group field
pub const TAG_GROUP: &str = "group";
/// Tag name of the kind field
pub const TAG_KIND: &str = "kind";
/// Tag name of the sub-kind field
pub const TAG_SUB_KIND: &str = "sub_kind";

/// Tag names in field order
pub const TAG_NAMES: [&str; FIELD_COUNT] = [
    TAG_NODE,
    TAG_CLIENT_ID,
    TAG_CHANNEL,
    TAG_GROUP,
    TAG_KIND,
    TAG_SUB_KIND,
];

/// Longest tag value accepted by [`Key::check_tags`], in bytes.
pub const MAX_TAG_VALUE_LEN: usize = 255;

/// Identity of a metric source: `(node, client_id, channel, group, kind, sub_kind)`.
///
/// The fields are stored in a single immutable encoded string, so keys are cheap to clone and
/// compare. Any field may be empty. Decoding never fails: a foreign or malformed encoding
/// yields empty strings for the fields it does not carry.
///
/// ```
/// use chanstats_core::Key;
///
/// let key = Key::new("node_1", "client_1", "orders", "", "publish", "");
/// assert_eq!(key.channel(), "orders");
/// assert_eq!(key.group(), "");
/// assert_eq!(Key::from_encoded(key.as_str()), key);
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(Arc<str>);

impl Key {
    /// Encode the six identity fields into a key
    pub fn new(
        node: &str,
        client_id: &str,
        channel: &str,
        group: &str,
        kind: &str,
        sub_kind: &str,
    ) -> Self {
        Self::from_fields([node, client_id, channel, group, kind, sub_kind])
    }

    /// Encode fields given in [`TAG_NAMES`] order
    pub fn from_fields(fields: [&str; FIELD_COUNT]) -> Self {
        Self(Arc::from(fields.join(KEY_DELIMITER)))
    }

    /// Wrap an already-encoded key, e.g. one returned by [`Key::as_str`]
    pub fn from_encoded(encoded: impl Into<Arc<str>>) -> Self {
        Self(encoded.into())
    }

    /// Build a key from `(tag name, tag value)` pairs.
    ///
    /// Tags that are not one of [`TAG_NAMES`] are ignored, missing tags become empty fields.
    pub fn from_tags<'a>(tags: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut fields = [""; FIELD_COUNT];
        for (name, value) in tags {
            if let Some(index) = TAG_NAMES.iter().position(|tag| *tag == name) {
                fields[index] = value;
            }
        }
        Self::from_fields(fields)
    }

    /// Build a key from a tag map, see [`Key::from_tags`]
    pub fn from_tag_map<S: BuildHasher>(tags: &HashMap<String, String, S>) -> Self {
        Self::from_tags(tags.iter().map(|(name, value)| (name.as_str(), value.as_str())))
    }

    /// Decode all fields, in [`TAG_NAMES`] order
    pub fn fields(&self) -> [&str; FIELD_COUNT] {
        let mut fields = [""; FIELD_COUNT];
        for (slot, value) in fields.iter_mut().zip(self.0.split(KEY_DELIMITER)) {
            *slot = value;
        }
        fields
    }

    fn field(&self, index: usize) -> &str {
        self.0.split(KEY_DELIMITER).nth(index).unwrap_or("")
    }

    /// The node field
    pub fn node(&self) -> &str {
        self.field(0)
    }

    /// The client id field
    pub fn client_id(&self) -> &str {
        self.field(1)
    }

    /// The channel field
    pub fn channel(&self) -> &str {
        self.field(2)
    }

    /// The group field
    pub fn group(&self) -> &str {
        self.field(3)
    }

    /// The kind field
    pub fn kind(&self) -> &str {
        self.field(4)
    }

    /// The sub-kind field
    pub fn sub_kind(&self) -> &str {
        self.field(5)
    }

    /// `kind`, or `kind_subkind` when the sub-kind is not empty
    pub fn kind_label(&self) -> String {
        match self.sub_kind() {
            "" => self.kind().to_owned(),
            sub_kind => format!("{}_{}", self.kind(), sub_kind),
        }
    }

    /// The encoded form of this key
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Non-empty fields as `(tag name, tag value)` pairs
    pub fn tags(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        TAG_NAMES
            .into_iter()
            .zip(self.fields())
            .filter(|(_, value)| !value.is_empty())
    }

    /// Check that every non-empty field is usable as a tag value.
    ///
    /// Tag values must be printable ASCII and at most [`MAX_TAG_VALUE_LEN`] bytes long.
    pub fn check_tags(&self) -> Result<(), RecordError> {
        for (tag, value) in self.tags() {
            let printable = value.bytes().all(|b| (b' '..=b'~').contains(&b));
            if !printable || value.len() > MAX_TAG_VALUE_LEN {
                return Err(RecordError::InvalidTagValue {
                    tag,
                    value: value.to_owned(),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Key");
        for (name, value) in TAG_NAMES.into_iter().zip(self.fields()) {
            s.field(name, &value);
        }
        s.finish()
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Key {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::check;
    use rstest::rstest;

    #[rstest]
    #[case(["node_1", "client_1", "", "", "", ""])]
    #[case(["node_2", "client_2", "some_channel_*,|,>%$#*Q1", "", "", ""])]
    #[case(["node_2", "client_2", "some_channel_*,|,>%$#*Q1", "q1", "publish", "subscribe"])]
    #[case(["", "", "", "", "", ""])]
    #[case(["", "", "", "", "", "only_last"])]
    #[case(["node_1", "client#|", "orders", "", "publish", ""])]
    #[case(["node_1", "client#", "|#orders", "#|#", "|publish", "#"])]
    #[case(["#|", "|", "#", "|#", "#|#|#", ""])]
    fn fields_round_trip(#[case] fields: [&str; FIELD_COUNT]) {
        let key = Key::from_fields(fields);
        check!(key.fields() == fields);
        check!(Key::from_encoded(key.as_str()) == key);
    }

    #[test]
    fn accessors() {
        let key = Key::new("n", "c", "ch", "g", "k", "s");
        check!(key.node() == "n");
        check!(key.client_id() == "c");
        check!(key.channel() == "ch");
        check!(key.group() == "g");
        check!(key.kind() == "k");
        check!(key.sub_kind() == "s");
    }

    #[test]
    fn malformed_encoding_degrades_to_empty_fields() {
        let key = Key::from_encoded("just_a_node");
        check!(key.fields() == ["just_a_node", "", "", "", "", ""]);
        check!(key.sub_kind() == "");

        let key = Key::from_encoded("a\u{1f}b");
        check!(key.client_id() == "b");
        check!(key.channel() == "");

        // a foreign separator is just part of a field
        let key = Key::from_encoded("a#|#b");
        check!(key.node() == "a#|#b");
        check!(key.client_id() == "");
    }

    #[test]
    fn tag_map_fills_missing_fields() {
        let tags: HashMap<String, String> = [
            ("channel".to_string(), "orders".to_string()),
            ("node".to_string(), "node_1".to_string()),
            ("unrelated".to_string(), "x".to_string()),
        ]
        .into_iter()
        .collect();
        let key = Key::from_tag_map(&tags);
        check!(key == Key::new("node_1", "", "orders", "", "", ""));
    }

    #[test]
    fn kind_label_joins_sub_kind() {
        check!(Key::new("", "", "", "", "publish", "").kind_label() == "publish");
        check!(
            Key::new("", "", "", "", "publish", "subscribe").kind_label() == "publish_subscribe"
        );
    }

    #[test]
    fn tags_skip_empty_fields() {
        let key = Key::new("n", "", "ch", "", "", "");
        let tags: Vec<_> = key.tags().collect();
        check!(tags == vec![("node", "n"), ("channel", "ch")]);
    }

    #[test]
    fn check_tags_rejects_unprintable_values() {
        check!(Key::new("n", "c", "some_channel_*,|,>%$#*Q1", "", "", "").check_tags().is_ok());

        let err = Key::new("n", "bad\nclient", "", "", "", "")
            .check_tags()
            .unwrap_err();
        check!(
            err == RecordError::InvalidTagValue {
                tag: "client_id",
                value: "bad\nclient".to_string()
            }
        );

        let long = "x".repeat(MAX_TAG_VALUE_LEN + 1);
        check!(Key::new("n", "", &long, "", "", "").check_tags().is_err());
    }
}
