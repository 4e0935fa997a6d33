//! Pure scoring functions behind the theme views: monetization score, score
//! trend, revenue projection and competitor saturation. Nothing here touches
//! the network; the trend loader only reads history through [`crate::store`].

pub mod competitors;
pub mod monetization;
pub mod revenue;
pub mod trend;

pub use competitors::{analyze_competitors, CompetitorLandscape, Saturation};
pub use monetization::{calculate_monetization_score, Factor, MonetizationFactors, MonetizationScore};
pub use revenue::{project_revenue, RevenueProjection};
pub use trend::{analyze_score_trend, load_score_trend, ScoreTrend, TrendDirection};
