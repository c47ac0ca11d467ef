pub mod component;
pub mod default_template;
pub mod grant;
pub mod group;
pub mod group_member;
pub mod template;
pub mod template_grant;
pub mod user;
