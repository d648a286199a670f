//! Typed repositories over the backend client, one per concern.
//!
//! Each repository is constructed with its collaborators (backend client + session
//! reader) and returns `Result`s; callers decide what an error means for their screen.

pub mod auth;
pub mod leaderboard;
pub mod missions;
pub mod profile;
pub mod trophies;

pub use auth::AuthRepository;
pub use leaderboard::LeaderboardRepository;
pub use missions::MissionsRepository;
pub use profile::ProfileRepository;
pub use trophies::TrophyRepository;
