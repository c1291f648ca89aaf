//! Fatal paths abort the process, so each scenario re-runs this test binary
//! filtered down to itself and inspects how the child died.

mod common;

use std::{env, process::Command};

use common::retaining_tree;
use rnalloc::TreeAllocator;

const SCENARIO_ENV: &str = "RNALLOC_ABORT_SCENARIO";

fn in_child(name: &str) -> bool {
  env::var(SCENARIO_ENV).as_deref() == Ok(name)
}

fn assert_child_aborts(name: &str) {
  let status = Command::new(env::current_exe().unwrap())
    .args(["--exact", name, "--nocapture", "--test-threads=1"])
    .env(SCENARIO_ENV, name)
    .status()
    .unwrap();

  assert!(!status.success(), "{name} exited cleanly");

  #[cfg(unix)]
  {
    use std::os::unix::process::ExitStatusExt;
    assert_eq!(status.signal(), Some(libc::SIGABRT), "{name} did not abort: {status}");
  }
}

#[test]
fn double_release_aborts() {
  if in_child("double_release_aborts") {
    let mut tree = retaining_tree();

    unsafe {
      let r = tree.allocate(8, None).unwrap();
      tree.allocate(8, Some(r)).unwrap();

      tree.release(Some(r));
      tree.release(Some(r));
    }
    return;
  }

  assert_child_aborts("double_release_aborts");
}

#[test]
fn double_release_of_leaf_aborts() {
  if in_child("double_release_of_leaf_aborts") {
    let mut tree = retaining_tree();

    unsafe {
      let leaf = tree.allocate(8, None).unwrap();

      tree.release(Some(leaf));
      tree.release(Some(leaf));
    }
    return;
  }

  assert_child_aborts("double_release_of_leaf_aborts");
}

#[test]
fn release_through_released_ancestor_aborts() {
  if in_child("release_through_released_ancestor_aborts") {
    let mut tree = retaining_tree();

    unsafe {
      let r = tree.allocate(8, None).unwrap();
      let a = tree.allocate(8, Some(r)).unwrap();
      tree.allocate(8, Some(a)).unwrap();

      tree.release(Some(r));
      tree.release(Some(a));
    }
    return;
  }

  assert_child_aborts("release_through_released_ancestor_aborts");
}

#[test]
fn double_release_with_libc_provider_aborts() {
  if in_child("double_release_with_libc_provider_aborts") {
    let mut tree = TreeAllocator::new();

    unsafe {
      let r = tree.allocate(8, None).unwrap();
      tree.allocate(8, Some(r)).unwrap();

      tree.release(Some(r));
      tree.release(Some(r));
    }
    return;
  }

  assert_child_aborts("double_release_with_libc_provider_aborts");
}

#[test]
fn double_release_of_leaf_with_libc_provider_aborts() {
  if in_child("double_release_of_leaf_with_libc_provider_aborts") {
    let mut tree = TreeAllocator::new();

    unsafe {
      let leaf = tree.allocate(8, None).unwrap();

      tree.release(Some(leaf));
      tree.release(Some(leaf));
    }
    return;
  }

  assert_child_aborts("double_release_of_leaf_with_libc_provider_aborts");
}
