//! Tracking of fiducial tokens placed on the surface.
//!
//! [`TokenTracker`] listens to a [`TouchManager`]'s batched pointer signals
//! and keeps the live set of object pointers as [`Token`]s, ready to drive
//! on-screen representations of the physical objects.

use std::collections::HashMap;
use std::sync::Arc;

use horizon_touch_core::logging::targets;
use horizon_touch_core::{ConnectionGuard, Point, Signal};
use parking_lot::Mutex;

use crate::manager::TouchManager;
use crate::pointer::{Pointer, PointerId, PointerType};

/// A fiducial object currently on the surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Token {
    /// The pointer representing this object.
    pub pointer_id: PointerId,
    /// Fiducial symbol id.
    pub object_id: i32,
    /// Screen position.
    pub position: Point,
    /// Rotation in radians.
    pub angle: f32,
}

impl Token {
    fn from_pointer(pointer: &Pointer) -> Option<Self> {
        if pointer.pointer_type() != PointerType::Object || pointer.is_internal() {
            return None;
        }
        let object = pointer.object()?;
        Some(Self {
            pointer_id: pointer.id(),
            object_id: object.object_id,
            position: pointer.position(),
            angle: object.angle,
        })
    }
}

#[derive(Default)]
struct Shared {
    tokens: Mutex<HashMap<PointerId, Token>>,
    token_added: Signal<Token>,
    token_updated: Signal<Token>,
    token_removed: Signal<Token>,
}

impl Shared {
    fn added(&self, pointers: &[Pointer]) {
        let added: Vec<Token> = {
            let mut tokens = self.tokens.lock();
            pointers
                .iter()
                .filter_map(Token::from_pointer)
                .filter(|token| tokens.insert(token.pointer_id, *token).is_none())
                .collect()
        };
        for token in added {
            tracing::trace!(target: targets::INPUT, pointer = %token.pointer_id, object_id = token.object_id, "token added");
            self.token_added.emit(token);
        }
    }

    fn updated(&self, pointers: &[Pointer]) {
        let updated: Vec<Token> = {
            let mut tokens = self.tokens.lock();
            pointers
                .iter()
                .filter_map(Token::from_pointer)
                .filter_map(|token| {
                    let slot = tokens.get_mut(&token.pointer_id)?;
                    *slot = token;
                    Some(token)
                })
                .collect()
        };
        for token in updated {
            self.token_updated.emit(token);
        }
    }

    fn removed(&self, pointers: &[Pointer]) {
        let removed: Vec<Token> = {
            let mut tokens = self.tokens.lock();
            pointers
                .iter()
                .filter_map(|pointer| tokens.remove(&pointer.id()))
                .collect()
        };
        for token in removed {
            tracing::trace!(target: targets::INPUT, pointer = %token.pointer_id, object_id = token.object_id, "token removed");
            self.token_removed.emit(token);
        }
    }
}

/// Live map of fiducial tokens, fed by a touch session.
///
/// Dropping the tracker disconnects it from the session.
pub struct TokenTracker {
    shared: Arc<Shared>,
    _connections: Vec<ConnectionGuard<Vec<Pointer>>>,
}

impl TokenTracker {
    /// Start tracking the object pointers of `manager`.
    pub fn attach(manager: &TouchManager) -> Self {
        let shared = Arc::new(Shared::default());

        let on_added = shared.clone();
        let on_updated = shared.clone();
        let on_removed = shared.clone();
        let on_cancelled = shared.clone();
        let connections = vec![
            manager
                .pointers_added()
                .connect_scoped(move |pointers| on_added.added(pointers)),
            manager
                .pointers_updated()
                .connect_scoped(move |pointers| on_updated.updated(pointers)),
            manager
                .pointers_removed()
                .connect_scoped(move |pointers| on_removed.removed(pointers)),
            manager
                .pointers_cancelled()
                .connect_scoped(move |pointers| on_cancelled.removed(pointers)),
        ];

        Self {
            shared,
            _connections: connections,
        }
    }

    /// Every live token, ordered by pointer id.
    pub fn tokens(&self) -> Vec<Token> {
        let mut tokens: Vec<Token> = self.shared.tokens.lock().values().copied().collect();
        tokens.sort_by_key(|token| token.pointer_id);
        tokens
    }

    /// The token carried by pointer `id`.
    pub fn token(&self, id: PointerId) -> Option<Token> {
        self.shared.tokens.lock().get(&id).copied()
    }

    /// Number of live tokens.
    pub fn len(&self) -> usize {
        self.shared.tokens.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn token_added(&self) -> &Signal<Token> {
        &self.shared.token_added
    }

    pub fn token_updated(&self) -> &Signal<Token> {
        &self.shared.token_updated
    }

    pub fn token_removed(&self) -> &Signal<Token> {
        &self.shared.token_removed
    }
}

impl std::fmt::Debug for TokenTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenTracker")
            .field("tokens", &self.len())
            .finish()
    }
}

static_assertions::assert_impl_all!(TokenTracker: Send, Sync);
