// Intentionally empty; this crate only hosts the end-to-end smoke tests.
