pub mod user_repo;
pub use user_repo::UserRepository;
pub mod plan_repo;
pub use plan_repo::PlanRepository;
pub mod assistant_repo;
pub use assistant_repo::AssistantRepository;
pub mod campaign_repo;
pub use campaign_repo::CampaignRepository;
pub mod support_repo;
pub use support_repo::SupportRepository;
pub mod billing_repo;
pub use billing_repo::BillingRepository;
