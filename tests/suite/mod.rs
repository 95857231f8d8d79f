//! Test suite modules

mod guard;
mod ordering;
mod scopes;
