/// Who is moving the feed right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interaction {
    #[default]
    Idle,
    /// The user's finger is on the list, or its momentum has not settled yet.
    UserDragging,
    /// A transition to `target` was requested and is not confirmed yet.
    AutoAdvancing { target: usize },
}

/// A requested move from one index to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advance {
    pub from: usize,
    pub to: usize,
}

impl Advance {
    pub fn is_wraparound(&self) -> bool {
        self.to < self.from
    }

    /// A single-item feed advances onto itself.
    pub fn is_in_place(&self) -> bool {
        self.to == self.from
    }
}

/// Owns the current index and the interaction state, and decides what a
/// finished item leads to.  The current index only ever changes through
/// `observe_visible`.
#[derive(Debug, Default)]
pub struct AdvanceCoordinator {
    len: usize,
    current: usize,
    interaction: Interaction,
}

impl AdvanceCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn current(&self) -> Option<usize> {
        (self.len > 0).then_some(self.current)
    }

    pub fn interaction(&self) -> Interaction {
        self.interaction
    }

    pub fn is_user_interacting(&self) -> bool {
        self.interaction == Interaction::UserDragging
    }

    /// A new item sequence replaced the old one.  Returns `true` if the current
    /// index had to be clamped.
    pub fn set_len(&mut self, len: usize) -> bool {
        self.len = len;
        if let Interaction::AutoAdvancing { target } = self.interaction {
            if target >= len {
                self.interaction = Interaction::Idle;
            }
        }
        let clamped = self.current.min(len.saturating_sub(1));
        let changed = clamped != self.current;
        self.current = clamped;
        changed
    }

    pub fn drag_begin(&mut self) {
        if let Interaction::AutoAdvancing { target } = self.interaction {
            log::info!("drag started, dropping auto-advance to {}", target);
        }
        self.interaction = Interaction::UserDragging;
    }

    pub fn drag_end(&mut self) {
        if self.interaction == Interaction::UserDragging {
            self.interaction = Interaction::Idle;
        }
    }

    /// The visible item finished presenting.  Returns the advance to carry out,
    /// if any.
    pub fn finished(&mut self) -> Option<Advance> {
        if self.len == 0 {
            return None;
        }
        match self.interaction {
            Interaction::UserDragging => {
                log::info!("user is scrolling, not advancing");
                None
            }
            Interaction::AutoAdvancing { target } => {
                log::info!("already advancing to {}, ignoring finish", target);
                None
            }
            Interaction::Idle => {
                let advance = Advance {
                    from: self.current,
                    to: self.next_index(),
                };
                if !advance.is_in_place() {
                    self.interaction = Interaction::AutoAdvancing { target: advance.to };
                }
                Some(advance)
            }
        }
    }

    /// The host reports `index` as the item predominantly on screen.  Returns
    /// the previous index if the current one changed.
    pub fn observe_visible(&mut self, index: usize) -> Option<usize> {
        if index >= self.len {
            log::warn!("observed index {} out of {} items", index, self.len);
            return None;
        }
        if index == self.current {
            // Still on the item being left, the transition has not landed.
            return None;
        }
        if let Interaction::AutoAdvancing { target } = self.interaction {
            if index != target {
                log::info!("landed on {} instead of {}", index, target);
            }
            self.interaction = Interaction::Idle;
        }
        Some(std::mem::replace(&mut self.current, index))
    }

    /// Forget any drag or pending transition, the feed went back to loading.
    pub fn reset_interaction(&mut self) {
        self.interaction = Interaction::Idle;
    }

    /// The transition to `target` will not be confirmed, either because the
    /// driver gave up or it never settled.
    pub fn abandon(&mut self, target: usize) {
        if self.interaction == (Interaction::AutoAdvancing { target }) {
            self.interaction = Interaction::Idle;
        }
    }

    fn next_index(&self) -> usize {
        (self.current + 1) % self.len
    }
}
