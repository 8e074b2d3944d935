use plinth_alloc::AVec;

/// Reference to a node in an [`Adt`](crate::Adt) tree.
///
/// Ids are stable for the lifetime of the tree: moving or swapping a node
/// re-homes it without changing its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// The node kinds of the tagged tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Fresh slot that has not been given a kind yet — reading one is a
    /// programming error.
    Uninitialised,
    Array,
    Object,
    String,
    /// Backtick-delimited string that may span lines.
    Multistring,
    Integer,
    Real,
}

/// Value properties: keyword sentinels and number-format markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeProps {
    #[default]
    None,
    Nan,
    NanNeg,
    Infinity,
    InfinityNeg,
    False,
    True,
    Null,
    /// The number was written in exponent form.
    IsExp,
    /// The integer was written as `0x…`.
    IsHex,
    /// The real was parsed from text and carries exact print metadata.
    IsParsedReal,
}

/// How an object key was quoted in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NameStyle {
    #[default]
    DoubleQuote,
    SingleQuote,
    NoQuotes,
}

/// Which assignment character separated key and value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssignStyle {
    #[default]
    Colon,
    Equals,
    Line,
}

/// Which delimiter followed the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DelimStyle {
    #[default]
    Comma,
    Line,
    Newline,
}

/// Exact-print metadata captured while parsing a number.
///
/// Kept for every number (not only when some analysis switch is on) so that
/// printing a parsed number reproduces its source bytes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NumberMeta {
    /// Digits before the decimal point, sign folded in.
    pub base: i64,
    /// Fraction digits after the leading zeros.
    pub frac_base: i64,
    /// Zeros between the decimal point and the first significant fraction
    /// digit.
    pub frac_leading_zeros: u8,
    /// Signed decimal exponent; positive means "times ten".
    pub decimal_exponent: i32,
    /// The source spelled a negative zero.
    pub neg_zero: bool,
    /// The source had digits before the decimal point.
    pub has_lead_digit: bool,
}

/// A node's payload, tagged by kind.
pub enum Value<'a> {
    Uninit,
    Object(AVec<'a, NodeId>),
    Array(AVec<'a, NodeId>),
    String(&'a str),
    Multistring(&'a str),
    Integer(i64, NumberMeta),
    Real(f64, NumberMeta),
}

/// One node of the tree: identity, formatting metadata, and payload.
pub struct Node<'a> {
    pub(crate) name: Option<&'a str>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) props: NodeProps,
    /// Top-level object written without enclosing braces.
    pub(crate) cfg_mode: bool,
    pub(crate) name_style: NameStyle,
    pub(crate) assign_style: AssignStyle,
    pub(crate) delim_style: DelimStyle,
    pub(crate) delim_line_width: u8,
    pub(crate) assign_line_width: u8,
    pub(crate) value: Value<'a>,
}

impl<'a> Node<'a> {
    pub(crate) fn uninit(parent: Option<NodeId>) -> Node<'a> {
        Node {
            name: None,
            parent,
            props: NodeProps::None,
            cfg_mode: false,
            name_style: NameStyle::default(),
            assign_style: AssignStyle::default(),
            delim_style: DelimStyle::default(),
            delim_line_width: 0,
            assign_line_width: 0,
            value: Value::Uninit,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self.value {
            Value::Uninit => NodeKind::Uninitialised,
            Value::Object(_) => NodeKind::Object,
            Value::Array(_) => NodeKind::Array,
            Value::String(_) => NodeKind::String,
            Value::Multistring(_) => NodeKind::Multistring,
            Value::Integer(..) => NodeKind::Integer,
            Value::Real(..) => NodeKind::Real,
        }
    }

    pub fn name(&self) -> Option<&'a str> {
        self.name
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn props(&self) -> NodeProps {
        self.props
    }

    pub fn is_container(&self) -> bool {
        matches!(self.value, Value::Object(_) | Value::Array(_))
    }

    /// String payload of a string or multistring node.
    pub fn as_str(&self) -> Option<&'a str> {
        match self.value {
            Value::String(s) | Value::Multistring(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self.value {
            Value::Integer(v, _) => Some(v),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self.value {
            Value::Real(v, _) => Some(v),
            _ => None,
        }
    }

    pub fn number_meta(&self) -> Option<&NumberMeta> {
        match &self.value {
            Value::Integer(_, meta) | Value::Real(_, meta) => Some(meta),
            _ => None,
        }
    }

    /// Whether the root was parsed in brace-less config mode.
    pub fn is_cfg_mode(&self) -> bool {
        self.cfg_mode
    }

    pub(crate) fn children(&self) -> Option<&AVec<'a, NodeId>> {
        match &self.value {
            Value::Object(c) | Value::Array(c) => Some(c),
            _ => None,
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut AVec<'a, NodeId>> {
        match &mut self.value {
            Value::Object(c) | Value::Array(c) => Some(c),
            _ => None,
        }
    }

    /// Child count of a container node; zero for leaves.
    pub fn child_count(&self) -> usize {
        self.children().map_or(0, AVec::len)
    }
}
