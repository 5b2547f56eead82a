use hashbrown::HashMap;

use super::Value;
use crate::ifr::Expression;
use crate::table::VarStoreInfo;

/// What an expression can see outside its own stack.
///
/// Every lookup defaults to "absent", which the machine turns into
/// `Undefined`.
pub trait Environment {
    /// Current value of a question.
    fn question(&self, _question_id: u16) -> Option<Value> {
        None
    }

    /// Value of the question the expression is attached to.
    fn this(&self) -> Option<Value> {
        None
    }

    /// The compiled body of a rule.
    fn rule(&self, _rule_id: u8) -> Option<Expression> {
        None
    }

    fn string(&self, _string_id: u16) -> Option<String> {
        None
    }

    fn get(&self, _var: &VarStoreInfo) -> Option<Value> {
        None
    }

    /// Store a value; returns whether the write succeeded.
    fn set(&mut self, _var: &VarStoreInfo, _value: &Value) -> bool {
        false
    }
}

/// An environment with nothing in it.
impl Environment for () {}

/// In-memory environment backed by hash maps.
///
/// Storage is keyed by store id and `VarStoreInfo` header value, so two
/// bindings to the same offset (or name) alias.
#[derive(Debug, Clone, Default)]
pub struct MapEnvironment {
    pub questions: HashMap<u16, Value>,
    pub this: Option<Value>,
    pub rules: HashMap<u8, Expression>,
    pub strings: HashMap<u16, String>,
    pub storage: HashMap<(u16, u16), Value>,
}

impl MapEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_question(mut self, question_id: u16, value: Value) -> Self {
        self.questions.insert(question_id, value);
        self
    }

    pub fn with_string(mut self, string_id: u16, s: impl Into<String>) -> Self {
        self.strings.insert(string_id, s.into());
        self
    }

    pub fn with_rule(mut self, rule_id: u8, body: Expression) -> Self {
        self.rules.insert(rule_id, body);
        self
    }

    fn key(var: &VarStoreInfo) -> (u16, u16) {
        (var.store.0, var.header_info())
    }
}

impl Environment for MapEnvironment {
    fn question(&self, question_id: u16) -> Option<Value> {
        self.questions.get(&question_id).cloned()
    }

    fn this(&self) -> Option<Value> {
        self.this.clone()
    }

    fn rule(&self, rule_id: u8) -> Option<Expression> {
        self.rules.get(&rule_id).cloned()
    }

    fn string(&self, string_id: u16) -> Option<String> {
        self.strings.get(&string_id).cloned()
    }

    fn get(&self, var: &VarStoreInfo) -> Option<Value> {
        self.storage.get(&Self::key(var)).cloned()
    }

    fn set(&mut self, var: &VarStoreInfo, value: &Value) -> bool {
        if value.is_undefined() {
            return false;
        }
        self.storage.insert(Self::key(var), value.clone());
        true
    }
}
