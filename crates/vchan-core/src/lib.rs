//! Timeline scheduling engine for virtual linear TV channels.
//!
//! Content flows leaf-first through the crate:
//! [`queue::ContentQueue`] → [`planner::CommercialPlanner`] →
//! [`builder::ScheduleBuilder`] → [`committed::CommittedTimeline`] /
//! [`state::ChannelStateStore`] → [`timeline::locate`] for viewers joining a
//! program already in progress. [`service::ChannelService`] ties the pieces
//! together for the daemon.

pub mod autogen;
pub mod builder;
pub mod catalog;
pub mod committed;
pub mod config;
pub mod error;
pub mod guide;
pub mod model;
pub mod planner;
pub mod platform;
pub mod policy;
pub mod queue;
pub mod service;
pub mod state;
pub mod timeline;

pub use error::{CatalogError, FilterError, ScheduleError};
pub use model::{ContentItem, ItemKind, ScheduledProgram, ScheduledSegment, SegmentKind};
pub use policy::{ChannelKind, ChannelPolicy, SelectionFilter};
