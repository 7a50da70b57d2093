// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod display;
pub mod history;
pub mod ids;
pub mod model;
pub mod session;
pub mod state;
pub mod submission;

pub use display::*;
pub use history::*;
pub use ids::*;
pub use model::*;
pub use session::*;
pub use state::*;
pub use submission::*;
