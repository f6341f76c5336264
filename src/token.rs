//! Decentralized shared state via weakly-tracked tokens.
//!
//! A [`TokenList`] tracks boolean or quantified state contributed by many
//! tasks at once. Holders keep tokens alive as `Rc<Token<T>>`; the list
//! only references them weakly, so a token is logically gone the moment its
//! last holder drops it. A token held across an await point therefore acts
//! like a scope guard: it reverts its contribution no matter how the task
//! ends, kill included.
//!
//! ```
//! use cotick::token::TokenList;
//!
//! let slows: TokenList<f32> = TokenList::new();
//! let strong = slows.take_token("mud puddle", 0.5);
//! assert!(slows.has_tokens());
//! assert_eq!(slows.get_min(), Some(0.5));
//! drop(strong);
//! assert!(!slows.has_tokens());
//! ```
//!
//! Expired entries are pruned lazily: any query may sanitize the interior
//! vector. Only externally observable behavior is specified; the interior
//! layout is not.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// A named, optionally data-bearing token. Shared as `Rc<Token<T>>`.
pub struct Token<T = ()> {
    name: String,
    data: T,
}

impl Token<()> {
    /// Creates a data-less token. The name is for debug output; by
    /// convention, the name of the function taking the token.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            data: (),
        })
    }
}

impl<T> Token<T> {
    /// Creates a token carrying `data`.
    #[must_use]
    pub fn new(name: impl Into<String>, data: T) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            data,
        })
    }

    /// The token's debug name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The token's data.
    #[must_use]
    pub fn data(&self) -> &T {
        &self.data
    }
}

/// Weak multiset of labelled tokens with aggregate queries.
pub struct TokenList<T = ()> {
    // Interior-mutable so read-only queries can sanitize.
    tokens: RefCell<Vec<Weak<Token<T>>>>,
}

impl<T> Default for TokenList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TokenList<T> {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tokens: RefCell::new(Vec::new()),
        }
    }

    /// Creates a token, adds it, and returns the strong reference that
    /// keeps it in the list.
    #[must_use = "the token leaves the list when the returned Rc is dropped"]
    pub fn take_token(&self, name: impl Into<String>, data: T) -> Rc<Token<T>> {
        let token = Token::new(name, data);
        self.push(token.clone());
        token
    }

    /// Adds an existing token. Duplicates (by identity) are ignored.
    pub fn add_token(&self, token: &Rc<Token<T>>) {
        let already_present = self
            .tokens
            .borrow()
            .iter()
            .any(|t| t.upgrade().is_some_and(|live| Rc::ptr_eq(&live, token)));
        if !already_present {
            self.push(token.clone());
        }
    }

    /// Removes a token by identity (swap-remove). Usually unnecessary:
    /// dropping the strong reference has the same observable effect.
    pub fn remove_token(&self, token: &Rc<Token<T>>) {
        let needle = Rc::downgrade(token);
        let mut tokens = self.tokens.borrow_mut();
        if let Some(index) = tokens.iter().position(|t| t.ptr_eq(&needle)) {
            tokens.swap_remove(index);
        }
    }

    /// Returns whether any live token remains.
    pub fn has_tokens(&self) -> bool {
        // Pop expired entries off the back until a live one shows up.
        let mut tokens = self.tokens.borrow_mut();
        while let Some(last) = tokens.last() {
            if last.upgrade().is_some() {
                return true;
            }
            tokens.pop();
        }
        false
    }

    /// Newline-joined names of all live tokens; `"[no tokens]"` when empty.
    #[must_use]
    pub fn get_debug_string(&self) -> String {
        let mut out = String::new();
        for token in self.tokens.borrow().iter() {
            if let Some(token) = token.upgrade() {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(token.name());
            }
        }
        if out.is_empty() {
            out.push_str("[no tokens]");
        }
        out
    }

    fn push(&self, token: Rc<Token<T>>) {
        self.sanitize();
        self.tokens.borrow_mut().push(Rc::downgrade(&token));
    }

    /// Drops every expired entry.
    fn sanitize(&self) {
        self.tokens
            .borrow_mut()
            .retain(|t| t.upgrade().is_some());
    }

    /// Sanitizes while feeding each live token's data to `f`, in insertion
    /// order.
    fn sanitize_and_visit(&self, mut f: impl FnMut(&T)) {
        self.tokens.borrow_mut().retain(|t| match t.upgrade() {
            Some(token) => {
                f(token.data());
                true
            }
            None => false,
        });
    }
}

impl<T: Clone> TokenList<T> {
    /// Data of every live token, in insertion order.
    #[must_use]
    pub fn get_token_data(&self) -> Vec<T> {
        let mut data = Vec::new();
        self.sanitize_and_visit(|d| data.push(d.clone()));
        data
    }

    /// Data of the least-recently-added live token.
    pub fn get_least_recent(&self) -> Option<T> {
        self.sanitize();
        let tokens = self.tokens.borrow();
        tokens.first().and_then(Weak::upgrade).map(|t| t.data().clone())
    }

    /// Data of the most-recently-added live token.
    pub fn get_most_recent(&self) -> Option<T> {
        self.sanitize();
        let tokens = self.tokens.borrow();
        tokens.last().and_then(Weak::upgrade).map(|t| t.data().clone())
    }
}

impl<T: Clone + PartialOrd> TokenList<T> {
    /// Smallest data among live tokens.
    pub fn get_min(&self) -> Option<T> {
        let mut min: Option<T> = None;
        self.sanitize_and_visit(|d| {
            if min.as_ref().is_none_or(|m| d < m) {
                min = Some(d.clone());
            }
        });
        min
    }

    /// Largest data among live tokens.
    pub fn get_max(&self) -> Option<T> {
        let mut max: Option<T> = None;
        self.sanitize_and_visit(|d| {
            if max.as_ref().is_none_or(|m| d > m) {
                max = Some(d.clone());
            }
        });
        max
    }
}

impl<T: Clone + Into<f64>> TokenList<T> {
    /// Arithmetic mean of live token data.
    pub fn get_mean(&self) -> Option<f64> {
        let mut total: Option<f64> = None;
        self.sanitize_and_visit(|d| {
            total = Some(total.unwrap_or(0.0) + d.clone().into());
        });
        total.map(|sum| sum / self.tokens.borrow().len() as f64)
    }
}

impl<T: PartialEq> TokenList<T> {
    /// Returns whether any live token carries `data`.
    pub fn contains(&self, data: &T) -> bool {
        let mut found = false;
        self.sanitize_and_visit(|d| {
            if d == data {
                found = true;
            }
        });
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregates_track_live_tokens() {
        let list: TokenList<i32> = TokenList::new();
        let a = list.take_token("a", 3);
        let b = list.take_token("b", 7);
        let c = list.take_token("c", 5);

        assert_eq!(list.get_max(), Some(7));
        assert_eq!(list.get_min(), Some(3));
        assert_eq!(list.get_most_recent(), Some(5));
        assert_eq!(list.get_least_recent(), Some(3));
        assert_eq!(list.get_mean(), Some(5.0));
        assert!(list.contains(&7));

        drop(b);
        assert_eq!(list.get_max(), Some(5));
        assert!(!list.contains(&7));
        assert!(list.has_tokens());

        drop(a);
        drop(c);
        assert!(!list.has_tokens());
        assert_eq!(list.get_max(), None);
        assert_eq!(list.get_mean(), None);
    }

    #[test]
    fn add_token_dedups_by_identity() {
        let list: TokenList<i32> = TokenList::new();
        let t = Token::new("t", 1);
        list.add_token(&t);
        list.add_token(&t);
        assert_eq!(list.get_token_data(), vec![1]);

        let same_value = Token::new("t", 1);
        list.add_token(&same_value);
        assert_eq!(list.get_token_data(), vec![1, 1]);
    }

    #[test]
    fn remove_token_removes_by_identity() {
        let list: TokenList<i32> = TokenList::new();
        let a = list.take_token("a", 1);
        let b = list.take_token("b", 2);
        list.remove_token(&a);
        assert_eq!(list.get_token_data(), vec![2]);
        drop(b);
        assert!(!list.has_tokens());
        drop(a);
    }

    #[test]
    fn debug_string_lists_live_names() {
        let list: TokenList = TokenList::new();
        assert_eq!(list.get_debug_string(), "[no tokens]");
        let _a = list.add_token(&Token::named("ghost"));
        // The Rc above dropped immediately: still no live tokens.
        assert_eq!(list.get_debug_string(), "[no tokens]");
        let held = list.take_token("held", ());
        assert_eq!(list.get_debug_string(), "held");
        drop(held);
    }

    #[test]
    fn unit_tokens_track_presence() {
        let list: TokenList = TokenList::new();
        let t = Token::named("poisoned");
        list.add_token(&t);
        assert!(list.has_tokens());
        drop(t);
        assert!(!list.has_tokens());
    }
}
