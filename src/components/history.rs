use std::collections::VecDeque;
use std::sync::Arc;

use crate::canvas::{Layer, LayerStack};

// ============================================================================
// SNAPSHOT COMMAND: before/after layer collections
// ============================================================================

/// One undoable step. Layer collections are shared copy-on-write, so a
/// snapshot is a pointer copy rather than a deep clone.
#[derive(Clone, Debug)]
pub struct SnapshotCommand {
    description: String,
    before: Arc<Vec<Layer>>,
    after: Option<Arc<Vec<Layer>>>,
}

impl SnapshotCommand {
    /// Create before performing the operation; call `set_after()` when done.
    pub fn new(description: impl Into<String>, layers: &LayerStack) -> Self {
        Self { description: description.into(), before: layers.snapshot(), after: None }
    }

    pub fn set_after(&mut self, layers: &LayerStack) {
        self.after = Some(layers.snapshot());
    }

    /// True when the operation left the collection untouched.
    pub fn is_noop(&self, layers: &LayerStack) -> bool {
        layers.is_snapshot(&self.before)
    }

    pub fn undo(&self, layers: &mut LayerStack) {
        layers.restore(Arc::clone(&self.before));
    }

    pub fn redo(&self, layers: &mut LayerStack) {
        if let Some(after) = &self.after {
            layers.restore(Arc::clone(after));
        }
    }

    /// Rename once the operation's effect is known.
    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Remove matching layers from both snapshots. Returns false once the
    /// step no longer changes anything.
    fn scrub(&mut self, doomed: &impl Fn(&Layer) -> bool) -> bool {
        self.before = without(&self.before, doomed);
        if let Some(after) = &self.after {
            self.after = Some(without(after, doomed));
        }
        self.after.as_ref().is_none_or(|after| **after != *self.before)
    }
}

fn without(snapshot: &Arc<Vec<Layer>>, doomed: &impl Fn(&Layer) -> bool) -> Arc<Vec<Layer>> {
    if !snapshot.iter().any(doomed) {
        return Arc::clone(snapshot);
    }
    Arc::new(snapshot.iter().filter(|l| !doomed(l)).cloned().collect())
}

// ============================================================================
// HISTORY MANAGER
// ============================================================================

pub struct HistoryManager {
    undo_stack: VecDeque<SnapshotCommand>,
    redo_stack: VecDeque<SnapshotCommand>,
    max_history_size: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(50)
    }
}

impl HistoryManager {
    pub fn new(max_history_size: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_history_size: max_history_size.max(1),
        }
    }

    pub fn push(&mut self, command: SnapshotCommand) {
        // A new action invalidates anything that was undone
        self.redo_stack.clear();
        self.undo_stack.push_back(command);
        while self.undo_stack.len() > self.max_history_size {
            self.undo_stack.pop_front();
        }
    }

    pub fn undo(&mut self, layers: &mut LayerStack) -> Option<String> {
        let command = self.undo_stack.pop_back()?;
        let description = command.description().to_string();
        command.undo(layers);
        self.redo_stack.push_back(command);
        Some(description)
    }

    pub fn redo(&mut self, layers: &mut LayerStack) -> Option<String> {
        let command = self.redo_stack.pop_back()?;
        let description = command.description().to_string();
        command.redo(layers);
        self.undo_stack.push_back(command);
        Some(description)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.back().map(|c| c.description())
    }

    /// All undo descriptions, most recent first.
    pub fn undo_history(&self) -> Vec<String> {
        self.undo_stack.iter().rev().map(|c| c.description().to_string()).collect()
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Strip layers matching `doomed` from every recorded step, dropping
    /// steps that are left with nothing to do.
    pub fn forget_layers(&mut self, doomed: impl Fn(&Layer) -> bool) {
        self.undo_stack.retain_mut(|c| c.scrub(&doomed));
        self.redo_stack.retain_mut(|c| c.scrub(&doomed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{LayerKind, LayerPatch, Point};

    fn sticker() -> Layer {
        Layer::new(LayerKind::Sticker { glyph: "✨".into() }, Point::new(10.0, 10.0), 80.0, [0, 0, 0, 255], 100)
    }

    fn record(history: &mut HistoryManager, layers: &mut LayerStack, desc: &str, op: impl FnOnce(&mut LayerStack)) {
        let mut cmd = SnapshotCommand::new(desc, layers);
        op(layers);
        cmd.set_after(layers);
        history.push(cmd);
    }

    #[test]
    fn undo_redo_walks_snapshots() {
        let mut history = HistoryManager::default();
        let mut layers = LayerStack::new();
        let mut id = None;
        record(&mut history, &mut layers, "Add sticker", |l| id = Some(l.insert(sticker())));
        let id = id.unwrap();
        record(&mut history, &mut layers, "Move", |l| {
            l.update(id, &LayerPatch::position(Point::new(50.0, 60.0)));
        });

        assert_eq!(history.undo(&mut layers).as_deref(), Some("Move"));
        assert_eq!(layers.get(id).unwrap().x, 10.0);
        assert_eq!(history.undo(&mut layers).as_deref(), Some("Add sticker"));
        assert!(layers.is_empty());
        assert_eq!(layers.selected(), None);
        assert!(history.undo(&mut layers).is_none());

        history.redo(&mut layers);
        history.redo(&mut layers);
        assert_eq!(layers.get(id).unwrap().x, 50.0);
        assert!(!history.can_redo());
    }

    #[test]
    fn push_clears_redo_and_respects_limit() {
        let mut history = HistoryManager::new(3);
        let mut layers = LayerStack::new();
        for i in 0..5 {
            record(&mut history, &mut layers, &format!("step {i}"), |l| {
                l.insert(sticker());
            });
        }
        assert_eq!(history.undo_count(), 3);
        assert_eq!(history.undo_history()[0], "step 4");
        history.undo(&mut layers);
        assert!(history.can_redo());
        record(&mut history, &mut layers, "fresh", |l| {
            l.insert(sticker());
        });
        assert!(!history.can_redo());
    }

    #[test]
    fn forgotten_layers_vanish_from_every_step() {
        let mut history = HistoryManager::default();
        let mut layers = LayerStack::new();
        let mut keep = None;
        let mut gone = None;
        record(&mut history, &mut layers, "Add keeper", |l| keep = Some(l.insert(sticker())));
        record(&mut history, &mut layers, "Add doomed", |l| gone = Some(l.insert(sticker())));
        let (keep, gone) = (keep.unwrap(), gone.unwrap());
        record(&mut history, &mut layers, "Move keeper", |l| {
            l.update(keep, &LayerPatch::position(Point::new(70.0, 70.0)));
        });

        layers.delete(gone);
        history.forget_layers(|layer| layer.id == gone);
        assert_eq!(history.undo_history(), vec!["Move keeper".to_string(), "Add keeper".to_string()]);

        assert_eq!(history.undo(&mut layers).as_deref(), Some("Move keeper"));
        assert!(layers.get(gone).is_none());
        assert_eq!(layers.get(keep).unwrap().x, 10.0);
        history.redo(&mut layers);
        assert!(layers.get(gone).is_none());
        assert_eq!(layers.len(), 1);
    }

    #[test]
    fn untouched_collection_is_a_noop() {
        let layers = LayerStack::new();
        let cmd = SnapshotCommand::new("Nothing", &layers);
        assert!(cmd.is_noop(&layers));
    }
}
