//! End-to-end tests for the community board live under `tests/`.
