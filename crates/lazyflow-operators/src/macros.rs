/// Implements `initialize`, `finalize` and `cancelled` as plain forwards to
/// `self.next`, for stages whose only behavior lives in `consume`.
macro_rules! forward_lifecycle {
    () => {
        fn initialize(&self, setup: &lazyflow_core::Setup) -> lazyflow_core::Result<()> {
            self.next.initialize(setup)
        }

        fn finalize(&self) -> lazyflow_core::Result<()> {
            self.next.finalize()
        }

        fn cancelled(&self) -> bool {
            self.next.cancelled()
        }
    };
}
