pub mod activity;
pub mod badge;
pub mod recommendation;
pub mod score;

pub use activity::{Activity, ActivityType, NewActivity};
pub use badge::{Badge, BadgeRequirements, UserBadge};
pub use recommendation::{NewRecommendation, Recommendation, RecommendationPriority};
pub use score::{EliteScore, NewEliteScore, ScoreMetadata};
