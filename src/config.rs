/// Tree allocator settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
  /// Reject `set_parent` and `cut` calls that would close a cycle. Costs a
  /// walk up the ancestor chain of the new parent on every call.
  pub check_cycles: bool,
}

impl Config {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn check_cycles(
    mut self,
    enabled: bool,
  ) -> Self {
    self.check_cycles = enabled;
    self
  }
}

impl Default for Config {
  fn default() -> Self {
    Self {
      check_cycles: cfg!(debug_assertions),
    }
  }
}
