//! Helper functions exposed to scripts
//!
//! Each binding is a named function reading the current [`PacketContext`]. Bindings
//! do not keep state between calls, and never fail: on invalid input they return
//! no value.

use std::fmt;
use std::rc::Rc;

use crate::context::PacketContext;

mod format;
mod layers;
mod pretty;

pub use format::{HardwareAddrStr, Hexdump};
pub use layers::{ContainsLayer, LayerIndex};
pub use pretty::{pretty_packet, PrettyPacket};

/// Value returned by a binding
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BindingValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl fmt::Display for BindingValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BindingValue::Bool(b) => write!(f, "{b}"),
            BindingValue::Int(i) => write!(f, "{i}"),
            BindingValue::Str(s) => f.write_str(s),
        }
    }
}

/// Common trait for script bindings
pub trait Binding {
    /// Name of the function, as seen by scripts
    fn name(&self) -> &'static str;

    /// Number of arguments
    fn arity(&self) -> usize;

    /// Call the binding. Missing arguments are read as empty strings.
    ///
    /// Returns `None` for "no value".
    fn invoke(&self, ctx: &PacketContext, args: &[String]) -> Option<BindingValue>;
}

/// Get argument `n`, or an empty string if missing
pub(crate) fn arg(args: &[String], n: usize) -> &str {
    args.get(n).map(|s| s.as_str()).unwrap_or("")
}

/// Binding Registry
///
/// The enumerable table of functions registered into the script engine.
#[derive(Clone)]
pub struct BindingRegistry {
    list: Vec<Rc<dyn Binding>>,
}

impl BindingRegistry {
    /// Create a new empty registry
    pub fn new() -> BindingRegistry {
        BindingRegistry { list: Vec::new() }
    }

    /// Add a binding. A binding with the same name is replaced.
    pub fn add_binding(&mut self, b: Rc<dyn Binding>) {
        self.list.retain(|x| x.name() != b.name());
        self.list.push(b);
    }

    pub fn get(&self, name: &str) -> Option<&Rc<dyn Binding>> {
        self.list.iter().find(|b| b.name() == name)
    }

    /// Call binding `name`. Returns `None` if it does not exist, or returned no value.
    pub fn invoke(&self, name: &str, ctx: &PacketContext, args: &[String]) -> Option<BindingValue> {
        self.get(name)?.invoke(ctx, args)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<dyn Binding>> {
        self.list.iter()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

impl Default for BindingRegistry {
    fn default() -> Self {
        let mut r = BindingRegistry::new();
        r.add_binding(Rc::new(ContainsLayer));
        r.add_binding(Rc::new(LayerIndex));
        r.add_binding(Rc::new(HardwareAddrStr));
        r.add_binding(Rc::new(Hexdump));
        r.add_binding(Rc::new(PrettyPacket));
        r
    }
}
