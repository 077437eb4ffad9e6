//! Lexical scopes.
//!
//! Frames live in one arena and point at their parent by index, so a closure
//! can hold on to the frame it was defined in with a plain [`ScopeId`]. Frames
//! are pushed and released in stack order as blocks and calls begin and end.
//! A frame that a closure was created in survives its release only while some
//! closure still reachable from the result or from an older frame points at it.

pub mod table;

use std::fmt;

use crate::diagnostics::AsStr;
use crate::syntax::ast::Name;
use crate::value::{Callable, Value};

pub use table::{Binding, SymbolTable};

/// Index of a [`Frame`] in [`Scopes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub usize);

impl ScopeId {
    /// The global frame, created with the arena.
    pub const GLOBAL: ScopeId = ScopeId(0);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeError {
    /// The name is already bound in this very frame.
    AlreadyDeclared,
    /// The name is bound nowhere along the chain.
    NotFound,
    /// The resolved binding is a constant.
    ConstViolation,
}

impl AsStr for ScopeError {
    fn as_str(&self) -> &'static str {
        match self {
            ScopeError::AlreadyDeclared => "variable already declared in this scope",
            ScopeError::NotFound => "variable not declared",
            ScopeError::ConstViolation => "cannot assign to a constant",
        }
    }
}

impl fmt::Display for ScopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::error::Error for ScopeError {}

#[derive(Debug, Default)]
pub struct Frame {
    pub table: SymbolTable,
    pub parent: Option<ScopeId>,
    captured: bool,
}

/// Arena of frames.
#[derive(Debug)]
pub struct Scopes {
    frames: Vec<Frame>,
}

impl Default for Scopes {
    fn default() -> Self {
        Self::new()
    }
}

impl Scopes {
    pub fn new() -> Self {
        Scopes { frames: vec![Frame { captured: true, ..Frame::default() }] }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[inline]
    pub fn frame(&self, id: ScopeId) -> &Frame {
        &self.frames[id.0]
    }

    /// Opens a new frame whose lookups fall back to `parent`.
    pub fn push(&mut self, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.frames.len());
        self.frames.push(Frame { parent: Some(parent), ..Frame::default() });
        id
    }

    /// Position to hand back to [`Scopes::release`] once the frames opened
    /// after this point are no longer needed.
    #[inline]
    pub fn mark(&self) -> usize {
        self.frames.len()
    }

    /// Drops every frame opened since `mark` that no live closure reaches.
    ///
    /// `result` is the value leaving the block or call. Roots are `result` and
    /// every binding below `mark`; a reached frame keeps its parent chain and
    /// the closures it holds alive. Ids are indices, so the arena is cut just
    /// above the highest reached frame and unreached frames under that cut are
    /// emptied.
    pub fn release(&mut self, mark: usize, result: &Value) {
        let len = self.frames.len();
        if mark >= len {
            return;
        }
        if !self.frames[mark..].iter().any(|f| f.captured) {
            self.frames.truncate(mark.max(1));
            return;
        }

        let mut pending = Vec::new();
        closure_envs(result, &mut pending);
        for frame in &self.frames[..mark] {
            for binding in frame.table.iter() {
                closure_envs(&binding.value, &mut pending);
            }
        }

        let mut reached = vec![false; len - mark];
        let mut keep = mark;
        while let Some(id) = pending.pop() {
            let Some(slot) = id.0.checked_sub(mark).and_then(|i| reached.get_mut(i)) else {
                continue;
            };
            if *slot {
                continue;
            }
            *slot = true;
            keep = keep.max(id.0 + 1);
            let frame = &self.frames[id.0];
            pending.extend(frame.parent);
            for binding in frame.table.iter() {
                closure_envs(&binding.value, &mut pending);
            }
        }

        for (frame, reached) in self.frames[mark..keep].iter_mut().zip(&reached) {
            if !reached {
                *frame = Frame { parent: frame.parent, ..Frame::default() };
            }
        }
        self.frames.truncate(keep.max(1));
    }

    /// Marks `id` as holding a closure, so [`Scopes::release`] checks
    /// whether it is still reachable before dropping it.
    #[inline]
    pub fn capture(&mut self, id: ScopeId) {
        self.frames[id.0].captured = true;
    }

    /// Binds `name` in `scope` itself.
    pub fn declare(
        &mut self,
        scope: ScopeId,
        name: Name,
        value: Value,
        is_const: bool,
    ) -> Result<(), ScopeError> {
        self.frames[scope.0]
            .table
            .insert(Binding { name, value, is_const })
            .map_err(|_| ScopeError::AlreadyDeclared)
    }

    /// Overwrites the nearest binding of `name`, wherever along the chain it
    /// was declared. A constant binding is left untouched.
    pub fn assign(&mut self, scope: ScopeId, name: &str, value: Value) -> Result<(), ScopeError> {
        let owner = self.owner_of(scope, name).ok_or(ScopeError::NotFound)?;
        let binding = self.frames[owner.0].table.get_mut(name).ok_or(ScopeError::NotFound)?;
        if binding.is_const {
            return Err(ScopeError::ConstViolation);
        }
        binding.value = value;
        Ok(())
    }

    /// Looks `name` up in `scope`, then its ancestors.
    pub fn resolve(&self, scope: ScopeId, name: &str) -> Option<&Value> {
        self.lookup(scope, name).map(|binding| &binding.value)
    }

    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<&Binding> {
        let owner = self.owner_of(scope, name)?;
        self.frames[owner.0].table.get(name)
    }

    fn owner_of(&self, scope: ScopeId, name: &str) -> Option<ScopeId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let frame = &self.frames[id.0];
            if frame.table.contains(name) {
                return Some(id);
            }
            current = frame.parent;
        }
        None
    }
}

/// Pushes the defining frame of every closure inside `value`.
fn closure_envs(value: &Value, out: &mut Vec<ScopeId>) {
    match value {
        Value::Function(Callable::Closure { env, .. }) => out.push(*env),
        Value::Array(items) => items.iter().for_each(|item| closure_envs(item, out)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::syntax::ast::FuncId;

    fn int(n: i64) -> Value {
        Value::Integer(n)
    }

    #[test]
    fn test_declare_twice_in_same_frame() {
        let mut scopes = Scopes::new();
        let g = ScopeId::GLOBAL;
        scopes.declare(g, Rc::from("x"), int(1), false).unwrap();
        assert_eq!(scopes.declare(g, Rc::from("x"), int(2), false), Err(ScopeError::AlreadyDeclared));
        assert_eq!(scopes.resolve(g, "x"), Some(&int(1)));
    }

    #[test]
    fn test_shadowing_leaves_parent_alone() {
        let mut scopes = Scopes::new();
        let g = ScopeId::GLOBAL;
        scopes.declare(g, Rc::from("x"), int(1), false).unwrap();
        let child = scopes.push(g);
        scopes.declare(child, Rc::from("x"), int(2), false).unwrap();
        assert_eq!(scopes.resolve(child, "x"), Some(&int(2)));
        assert_eq!(scopes.resolve(g, "x"), Some(&int(1)));
    }

    #[test]
    fn test_assign_writes_through_to_declaring_frame() {
        let mut scopes = Scopes::new();
        let g = ScopeId::GLOBAL;
        scopes.declare(g, Rc::from("x"), int(1), false).unwrap();
        let child = scopes.push(g);
        scopes.assign(child, "x", int(2)).unwrap();
        assert_eq!(scopes.resolve(g, "x"), Some(&int(2)));
        assert_eq!(scopes.assign(child, "missing", int(0)), Err(ScopeError::NotFound));
    }

    #[test]
    fn test_const_is_never_overwritten() {
        let mut scopes = Scopes::new();
        let g = ScopeId::GLOBAL;
        scopes.declare(g, Rc::from("k"), int(7), true).unwrap();
        let child = scopes.push(g);
        assert_eq!(scopes.assign(child, "k", int(8)), Err(ScopeError::ConstViolation));
        assert_eq!(scopes.resolve(g, "k"), Some(&int(7)));
    }

    #[test]
    fn test_release_drops_frames_in_stack_order() {
        let mut scopes = Scopes::new();
        let mark = scopes.mark();
        let a = scopes.push(ScopeId::GLOBAL);
        scopes.push(a);
        assert_eq!(scopes.len(), 3);
        scopes.release(mark, &Value::Null);
        assert_eq!(scopes.len(), 1);
    }

    fn closure_in(env: ScopeId) -> Value {
        Value::Function(Callable::Closure { func: FuncId(0), env })
    }

    #[test]
    fn test_release_keeps_frames_the_result_reaches() {
        let mut scopes = Scopes::new();
        let mark = scopes.mark();
        let a = scopes.push(ScopeId::GLOBAL);
        scopes.declare(a, Rc::from("y"), int(3), false).unwrap();
        let b = scopes.push(a);
        scopes.capture(a);
        scopes.push(b);
        scopes.release(mark, &closure_in(a));
        assert_eq!(scopes.len(), 2);
        assert_eq!(scopes.resolve(a, "y"), Some(&int(3)));
    }

    #[test]
    fn test_release_drops_unreached_captured_frames() {
        let mut scopes = Scopes::new();
        let mark = scopes.mark();
        let a = scopes.push(ScopeId::GLOBAL);
        scopes.declare(a, Rc::from("f"), closure_in(a), false).unwrap();
        scopes.capture(a);
        scopes.release(mark, &int(0));
        assert_eq!(scopes.len(), 1);
    }

    #[test]
    fn test_closure_stored_below_mark_is_a_root() {
        let mut scopes = Scopes::new();
        scopes.declare(ScopeId::GLOBAL, Rc::from("keep"), Value::Null, false).unwrap();
        let mark = scopes.mark();
        let a = scopes.push(ScopeId::GLOBAL);
        let b = scopes.push(a);
        scopes.capture(b);
        scopes.assign(b, "keep", Value::Array(vec![closure_in(b)])).unwrap();
        scopes.release(mark, &Value::Null);
        assert_eq!(scopes.len(), 3);
        assert_eq!(scopes.frame(b).parent, Some(a));
    }

    #[test]
    fn test_unreached_frame_under_the_cut_is_emptied() {
        let mut scopes = Scopes::new();
        let mark = scopes.mark();
        let a = scopes.push(ScopeId::GLOBAL);
        scopes.declare(a, Rc::from("big"), int(1), false).unwrap();
        let b = scopes.push(ScopeId::GLOBAL);
        scopes.capture(b);
        scopes.release(mark, &closure_in(b));
        assert_eq!(scopes.len(), 3);
        assert!(scopes.frame(a).table.is_empty());
    }

    #[test]
    fn test_global_frame_survives_release() {
        let mut scopes = Scopes::new();
        scopes.release(0, &Value::Null);
        assert_eq!(scopes.len(), 1);
    }
}
