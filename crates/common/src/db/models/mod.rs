//! SeaORM entity models

mod annotation;
mod bookmark;
mod bookmark_list;
mod cms_page;
mod comment;
mod download_job;
mod download_job_observer;
mod feature_set;
mod geo_map;
mod user;

pub use user::{
    Entity as UserEntity,
    Model as User,
    ActiveModel as UserActiveModel,
    Column as UserColumn,
};

pub use bookmark_list::{
    Entity as BookmarkListEntity,
    Model as BookmarkList,
    ActiveModel as BookmarkListActiveModel,
    Column as BookmarkListColumn,
};

pub use bookmark::{
    Entity as BookmarkEntity,
    Model as Bookmark,
    ActiveModel as BookmarkActiveModel,
    Column as BookmarkColumn,
};

pub use comment::{
    Entity as CommentEntity,
    Model as Comment,
    ActiveModel as CommentActiveModel,
    Column as CommentColumn,
};

pub use annotation::{
    Entity as AnnotationEntity,
    Model as Annotation,
    ActiveModel as AnnotationActiveModel,
    Column as AnnotationColumn,
};

pub use cms_page::{
    Entity as CmsPageEntity,
    Model as CmsPage,
    ActiveModel as CmsPageActiveModel,
    Column as CmsPageColumn,
};

pub use download_job::{
    Entity as DownloadJobEntity,
    Model as DownloadJob,
    ActiveModel as DownloadJobActiveModel,
    Column as DownloadJobColumn,
    DownloadJobType,
    JobStatus,
};

pub use download_job_observer::{
    Entity as DownloadJobObserverEntity,
    Model as DownloadJobObserver,
    ActiveModel as DownloadJobObserverActiveModel,
    Column as DownloadJobObserverColumn,
};

pub use geo_map::{
    Entity as GeoMapEntity,
    Model as GeoMap,
    ActiveModel as GeoMapActiveModel,
    Column as GeoMapColumn,
};

pub use feature_set::{
    Entity as FeatureSetEntity,
    Model as FeatureSet,
    ActiveModel as FeatureSetActiveModel,
    Column as FeatureSetColumn,
};
