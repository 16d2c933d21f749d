/// System-wide toggles the engine consults at evaluation time.
pub trait SystemSettings: Send + Sync {
    /// When true, an approval must additionally be accepted at the next
    /// level up before it counts as final, and accept/unaccept become legal
    /// actions.
    fn acceptance_required_for_approval(&self) -> bool;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct StaticSettings {
    pub acceptance_required: bool,
}

impl SystemSettings for StaticSettings {
    fn acceptance_required_for_approval(&self) -> bool {
        self.acceptance_required
    }
}
