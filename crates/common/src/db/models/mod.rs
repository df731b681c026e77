//! SeaORM entity models
//!
//! Shared-schema entities (centers, domains, users, sessions) are pinned to
//! `public`; tenant entities (samples, results) resolve through the active
//! tenant scope.

mod center;
mod domain;
mod sample;
mod sample_result;
mod user;
mod user_session;

pub use center::{
    Entity as CenterEntity,
    Model as Center,
    ActiveModel as CenterActiveModel,
    Column as CenterColumn,
};

pub use domain::{
    Entity as DomainEntity,
    Model as Domain,
    ActiveModel as DomainActiveModel,
    Column as DomainColumn,
};

pub use user::{
    Entity as UserEntity,
    Model as User,
    ActiveModel as UserActiveModel,
    Column as UserColumn,
};

pub use user_session::{
    Entity as UserSessionEntity,
    Model as UserSession,
    ActiveModel as UserSessionActiveModel,
    Column as UserSessionColumn,
};

pub use sample::{
    Entity as SampleEntity,
    Model as Sample,
    ActiveModel as SampleActiveModel,
    Column as SampleColumn,
    SampleStatus,
};

pub use sample_result::{
    Entity as SampleResultEntity,
    Model as SampleResult,
    ActiveModel as SampleResultActiveModel,
    Column as SampleResultColumn,
};
