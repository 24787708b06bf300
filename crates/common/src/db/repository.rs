//! Repository pattern for database operations
//!
//! One entry point for all persisted viewer data: users, bookmark lists,
//! comments, annotations, CMS pages, download jobs and geo maps.
//! Lookups return `Ok(None)` when nothing matches; updates and deletes
//! report whether a row was affected.

use crate::bookmarks::NewBookmark;
use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::Result;
use sea_orm::{
    sea_query::OnConflict, ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

/// Map "no row updated" to `false`
fn updated<T>(result: std::result::Result<T, DbErr>) -> Result<bool> {
    match result {
        Ok(_) => Ok(true),
        Err(DbErr::RecordNotUpdated) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn now() -> sea_orm::prelude::DateTimeWithTimeZone {
    chrono::Utc::now().into()
}

fn download_job_insert(job: DownloadJobActiveModel) -> sea_orm::Insert<DownloadJobActiveModel> {
    DownloadJobEntity::insert(job).on_conflict(
        OnConflict::column(DownloadJobColumn::Identifier)
            .do_nothing()
            .to_owned(),
    )
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    // ========================================================================
    // Health Check & Schema
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    /// Apply pending schema migrations
    pub async fn migrate(&self) -> Result<()> {
        self.pool.migrate().await
    }

    // ========================================================================
    // User Operations
    // ========================================================================

    pub async fn create_user(
        &self,
        email: String,
        display_name: String,
        password_hash: Option<String>,
        is_admin: bool,
    ) -> Result<User> {
        let user = UserActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email),
            display_name: Set(display_name),
            password_hash: Set(password_hash),
            is_admin: Set(is_admin),
            created_at: Set(now()),
        };

        user.insert(self.write_conn()).await.map_err(Into::into)
    }

    pub async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        UserEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        UserEntity::find()
            .filter(UserColumn::Email.eq(email))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Bookmark List Operations
    // ========================================================================

    pub async fn create_bookmark_list(
        &self,
        owner_id: Uuid,
        name: String,
        description: Option<String>,
        is_public: bool,
        share_key: String,
    ) -> Result<BookmarkList> {
        let now = now();
        let list = BookmarkListActiveModel {
            owner_id: Set(owner_id),
            name: Set(name),
            description: Set(description),
            is_public: Set(is_public),
            share_key: Set(share_key),
            date_created: Set(now),
            date_updated: Set(now),
            ..Default::default()
        };

        list.insert(self.write_conn()).await.map_err(Into::into)
    }

    pub async fn find_bookmark_list(&self, id: i64) -> Result<Option<BookmarkList>> {
        BookmarkListEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    pub async fn find_bookmark_list_by_share_key(&self, share_key: &str) -> Result<Option<BookmarkList>> {
        BookmarkListEntity::find()
            .filter(BookmarkListColumn::ShareKey.eq(share_key))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    pub async fn bookmark_lists_for_user(&self, owner_id: Uuid) -> Result<Vec<BookmarkList>> {
        BookmarkListEntity::find()
            .filter(BookmarkListColumn::OwnerId.eq(owner_id))
            .order_by_asc(BookmarkListColumn::Name)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    pub async fn public_bookmark_lists(&self) -> Result<Vec<BookmarkList>> {
        BookmarkListEntity::find()
            .filter(BookmarkListColumn::IsPublic.eq(true))
            .order_by_desc(BookmarkListColumn::DateUpdated)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Store all fields of a list, refreshing `date_updated`
    pub async fn update_bookmark_list(&self, mut list: BookmarkList) -> Result<bool> {
        list.date_updated = now();
        let active = BookmarkListActiveModel::from(list).reset_all();
        updated(BookmarkListEntity::update(active).exec(self.write_conn()).await)
    }

    pub async fn delete_bookmark_list(&self, id: i64) -> Result<bool> {
        let result = BookmarkListEntity::delete_by_id(id)
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }

    // ========================================================================
    // Bookmark Operations
    // ========================================================================

    pub async fn add_bookmark(&self, list_id: i64, bookmark: NewBookmark) -> Result<Bookmark> {
        let model = BookmarkActiveModel {
            list_id: Set(list_id),
            pi: Set(bookmark.pi),
            logid: Set(bookmark.logid),
            page_order: Set(bookmark.order),
            url: Set(bookmark.url),
            title: Set(bookmark.title),
            description: Set(bookmark.description),
            date_added: Set(now()),
            ..Default::default()
        };

        model.insert(self.write_conn()).await.map_err(Into::into)
    }

    pub async fn bookmarks_in_list(&self, list_id: i64) -> Result<Vec<Bookmark>> {
        BookmarkEntity::find()
            .filter(BookmarkColumn::ListId.eq(list_id))
            .order_by_asc(BookmarkColumn::DateAdded)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    pub async fn find_bookmark(&self, id: i64) -> Result<Option<Bookmark>> {
        BookmarkEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    pub async fn delete_bookmark(&self, id: i64) -> Result<bool> {
        let result = BookmarkEntity::delete_by_id(id)
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }

    pub async fn bookmark_count(&self, list_id: i64) -> Result<u64> {
        BookmarkEntity::find()
            .filter(BookmarkColumn::ListId.eq(list_id))
            .count(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Comment Operations
    // ========================================================================

    pub async fn add_comment(&self, pi: String, page_order: i32, owner_id: Uuid, text: String) -> Result<Comment> {
        let comment = CommentActiveModel {
            pi: Set(pi),
            page_order: Set(page_order),
            owner_id: Set(owner_id),
            text: Set(text),
            date_created: Set(now()),
            date_updated: Set(None),
            ..Default::default()
        };

        comment.insert(self.write_conn()).await.map_err(Into::into)
    }

    pub async fn find_comment(&self, id: i64) -> Result<Option<Comment>> {
        CommentEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    pub async fn comments_for_page(&self, pi: &str, page_order: i32) -> Result<Vec<Comment>> {
        CommentEntity::find()
            .filter(CommentColumn::Pi.eq(pi))
            .filter(CommentColumn::PageOrder.eq(page_order))
            .order_by_asc(CommentColumn::DateCreated)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    pub async fn comments_for_record(&self, pi: &str) -> Result<Vec<Comment>> {
        CommentEntity::find()
            .filter(CommentColumn::Pi.eq(pi))
            .order_by_asc(CommentColumn::PageOrder)
            .order_by_asc(CommentColumn::DateCreated)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    pub async fn comments_by_user(&self, owner_id: Uuid) -> Result<Vec<Comment>> {
        CommentEntity::find()
            .filter(CommentColumn::OwnerId.eq(owner_id))
            .order_by_desc(CommentColumn::DateCreated)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Replace the text of a comment and stamp `date_updated`
    pub async fn update_comment(&self, id: i64, text: String) -> Result<bool> {
        let active = CommentActiveModel {
            id: Set(id),
            text: Set(text),
            date_updated: Set(Some(now())),
            ..Default::default()
        };
        updated(CommentEntity::update(active).exec(self.write_conn()).await)
    }

    pub async fn delete_comment(&self, id: i64) -> Result<bool> {
        let result = CommentEntity::delete_by_id(id)
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }

    pub async fn delete_comments_for_record(&self, pi: &str) -> Result<u64> {
        let result = CommentEntity::delete_many()
            .filter(CommentColumn::Pi.eq(pi))
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected)
    }

    /// Number of comments, optionally restricted to one record
    pub async fn comment_count(&self, pi: Option<&str>) -> Result<u64> {
        let mut query = CommentEntity::find();
        if let Some(pi) = pi {
            query = query.filter(CommentColumn::Pi.eq(pi));
        }
        query.count(self.read_conn()).await.map_err(Into::into)
    }

    // ========================================================================
    // Annotation Operations
    // ========================================================================

    pub async fn add_annotation(
        &self,
        motivation: String,
        body: serde_json::Value,
        target: serde_json::Value,
        creator_id: Option<Uuid>,
        target_pi: String,
        target_page: Option<i32>,
    ) -> Result<Annotation> {
        let annotation = AnnotationActiveModel {
            motivation: Set(motivation),
            body: Set(body),
            target: Set(target),
            creator_id: Set(creator_id),
            target_pi: Set(target_pi),
            target_page: Set(target_page),
            date_created: Set(now()),
            date_modified: Set(None),
            ..Default::default()
        };

        annotation.insert(self.write_conn()).await.map_err(Into::into)
    }

    pub async fn find_annotation(&self, id: i64) -> Result<Option<Annotation>> {
        AnnotationEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Annotations on a record, or on one page of it
    pub async fn annotations_for_target(&self, pi: &str, page: Option<i32>) -> Result<Vec<Annotation>> {
        let mut query = AnnotationEntity::find().filter(AnnotationColumn::TargetPi.eq(pi));
        if let Some(page) = page {
            query = query.filter(AnnotationColumn::TargetPage.eq(page));
        }
        query
            .order_by_asc(AnnotationColumn::Id)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    pub async fn annotations_by_creator(&self, creator_id: Uuid) -> Result<Vec<Annotation>> {
        AnnotationEntity::find()
            .filter(AnnotationColumn::CreatorId.eq(creator_id))
            .order_by_desc(AnnotationColumn::DateCreated)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Store all fields of an annotation, stamping `date_modified`
    pub async fn update_annotation(&self, mut annotation: Annotation) -> Result<bool> {
        annotation.date_modified = Some(now());
        let active = AnnotationActiveModel::from(annotation).reset_all();
        updated(AnnotationEntity::update(active).exec(self.write_conn()).await)
    }

    pub async fn delete_annotation(&self, id: i64) -> Result<bool> {
        let result = AnnotationEntity::delete_by_id(id)
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }

    // ========================================================================
    // CMS Page Operations
    // ========================================================================

    pub async fn create_cms_page(
        &self,
        title: String,
        menu_title: Option<String>,
        content: String,
        published: bool,
        related_pi: Option<String>,
    ) -> Result<CmsPage> {
        let now = now();
        let page = CmsPageActiveModel {
            title: Set(title),
            menu_title: Set(menu_title),
            content: Set(content),
            published: Set(published),
            related_pi: Set(related_pi),
            date_created: Set(now),
            date_updated: Set(now),
            ..Default::default()
        };

        page.insert(self.write_conn()).await.map_err(Into::into)
    }

    pub async fn find_cms_page(&self, id: i64) -> Result<Option<CmsPage>> {
        CmsPageEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    pub async fn cms_pages(&self, published_only: bool) -> Result<Vec<CmsPage>> {
        let mut query = CmsPageEntity::find();
        if published_only {
            query = query.filter(CmsPageColumn::Published.eq(true));
        }
        query
            .order_by_asc(CmsPageColumn::Title)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    pub async fn cms_pages_for_record(&self, pi: &str) -> Result<Vec<CmsPage>> {
        CmsPageEntity::find()
            .filter(CmsPageColumn::RelatedPi.eq(pi))
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    pub async fn update_cms_page(&self, mut page: CmsPage) -> Result<bool> {
        page.date_updated = now();
        let active = CmsPageActiveModel::from(page).reset_all();
        updated(CmsPageEntity::update(active).exec(self.write_conn()).await)
    }

    pub async fn delete_cms_page(&self, id: i64) -> Result<bool> {
        let result = CmsPageEntity::delete_by_id(id)
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }

    // ========================================================================
    // Download Job Operations
    // ========================================================================

    /// Insert a job unless one with the same identifier exists
    ///
    /// Returns the stored job and whether this call inserted it. Concurrent
    /// requests for the same file end up with the same row.
    pub async fn create_download_job(
        &self,
        job_type: DownloadJobType,
        identifier: String,
        pi: String,
        logid: Option<String>,
        ttl_secs: i64,
    ) -> Result<(DownloadJob, bool)> {
        let job = DownloadJobActiveModel {
            job_type: Set(job_type.as_str().to_string()),
            identifier: Set(identifier.clone()),
            pi: Set(pi),
            logid: Set(logid),
            status: Set(JobStatus::Initialized.into()),
            message: Set(None),
            last_requested: Set(now()),
            ttl_secs: Set(ttl_secs),
            queue_position: Set(None),
            ..Default::default()
        };

        let inserted = download_job_insert(job)
            .exec_without_returning(self.write_conn())
            .await?
            > 0;
        let stored = self
            .find_download_job_on_primary(&identifier)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("download job {}", identifier)))?;
        Ok((stored, inserted))
    }

    /// Lookup that does not lag behind writes
    pub async fn find_download_job_on_primary(&self, identifier: &str) -> Result<Option<DownloadJob>> {
        DownloadJobEntity::find()
            .filter(DownloadJobColumn::Identifier.eq(identifier))
            .one(self.write_conn())
            .await
            .map_err(Into::into)
    }

    pub async fn find_download_job(&self, id: i64) -> Result<Option<DownloadJob>> {
        DownloadJobEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    pub async fn find_download_job_by_identifier(&self, identifier: &str) -> Result<Option<DownloadJob>> {
        DownloadJobEntity::find()
            .filter(DownloadJobColumn::Identifier.eq(identifier))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    pub async fn download_jobs_by_status(&self, statuses: &[JobStatus]) -> Result<Vec<DownloadJob>> {
        DownloadJobEntity::find()
            .filter(DownloadJobColumn::Status.is_in(statuses.iter().map(|s| s.as_str())))
            .order_by_asc(DownloadJobColumn::LastRequested)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    pub async fn download_jobs(&self) -> Result<Vec<DownloadJob>> {
        DownloadJobEntity::find()
            .order_by_asc(DownloadJobColumn::Id)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    pub async fn update_download_job(&self, job: DownloadJob) -> Result<bool> {
        let active = DownloadJobActiveModel::from(job).reset_all();
        updated(DownloadJobEntity::update(active).exec(self.write_conn()).await)
    }

    /// Register an address for a job; returns `false` when it was already registered
    pub async fn add_download_job_observer(&self, job_id: i64, email: &str) -> Result<bool> {
        let existing = DownloadJobObserverEntity::find()
            .filter(DownloadJobObserverColumn::JobId.eq(job_id))
            .filter(DownloadJobObserverColumn::Email.eq(email))
            .one(self.write_conn())
            .await?;
        if existing.is_some() {
            return Ok(false);
        }

        let observer = DownloadJobObserverActiveModel {
            job_id: Set(job_id),
            email: Set(email.to_string()),
            ..Default::default()
        };
        observer.insert(self.write_conn()).await?;
        Ok(true)
    }

    pub async fn download_job_observers(&self, job_id: i64) -> Result<Vec<String>> {
        let observers = DownloadJobObserverEntity::find()
            .filter(DownloadJobObserverColumn::JobId.eq(job_id))
            .all(self.read_conn())
            .await?;

        Ok(observers.into_iter().map(|o| o.email).collect())
    }

    pub async fn delete_download_job(&self, id: i64) -> Result<bool> {
        let result = DownloadJobEntity::delete_by_id(id)
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }

    // ========================================================================
    // Geo Map Operations
    // ========================================================================

    pub async fn create_geo_map(
        &self,
        title: String,
        description: Option<String>,
        map_type: String,
        initial_view: serde_json::Value,
    ) -> Result<GeoMap> {
        let now = now();
        let map = GeoMapActiveModel {
            title: Set(title),
            description: Set(description),
            map_type: Set(map_type),
            initial_view: Set(initial_view),
            date_created: Set(now),
            date_updated: Set(now),
            ..Default::default()
        };

        map.insert(self.write_conn()).await.map_err(Into::into)
    }

    pub async fn find_geo_map(&self, id: i64) -> Result<Option<GeoMap>> {
        GeoMapEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    pub async fn geo_maps(&self) -> Result<Vec<GeoMap>> {
        GeoMapEntity::find()
            .order_by_asc(GeoMapColumn::Title)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    pub async fn update_geo_map(&self, mut map: GeoMap) -> Result<bool> {
        map.date_updated = now();
        let active = GeoMapActiveModel::from(map).reset_all();
        updated(GeoMapEntity::update(active).exec(self.write_conn()).await)
    }

    pub async fn delete_geo_map(&self, id: i64) -> Result<bool> {
        let result = GeoMapEntity::delete_by_id(id)
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }

    pub async fn add_feature_set(
        &self,
        map_id: i64,
        name: String,
        kind: String,
        features: serde_json::Value,
        query: Option<String>,
        marker: Option<String>,
    ) -> Result<FeatureSet> {
        let set = FeatureSetActiveModel {
            map_id: Set(map_id),
            name: Set(name),
            kind: Set(kind),
            features: Set(features),
            query: Set(query),
            marker: Set(marker),
            ..Default::default()
        };

        set.insert(self.write_conn()).await.map_err(Into::into)
    }

    pub async fn feature_sets_for_map(&self, map_id: i64) -> Result<Vec<FeatureSet>> {
        FeatureSetEntity::find()
            .filter(FeatureSetColumn::MapId.eq(map_id))
            .order_by_asc(FeatureSetColumn::Id)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    pub async fn delete_feature_set(&self, id: i64) -> Result<bool> {
        let result = FeatureSetEntity::delete_by_id(id)
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_updated_maps_to_false() {
        assert!(!updated::<()>(Err(DbErr::RecordNotUpdated)).unwrap());
        assert!(updated(Ok(())).unwrap());
        assert!(updated::<()>(Err(DbErr::Custom("boom".into()))).is_err());
    }

    #[test]
    fn test_download_job_insert_skips_existing_identifier() {
        use sea_orm::{DbBackend, QueryTrait};

        let job = DownloadJobActiveModel {
            job_type: Set("pdf".to_string()),
            identifier: Set("abc".to_string()),
            pi: Set("PPN1".to_string()),
            ..Default::default()
        };
        let sql = download_job_insert(job).build(DbBackend::Postgres).to_string();
        assert!(sql.starts_with("INSERT INTO"), "{}", sql);
        assert!(sql.contains(r#"ON CONFLICT ("identifier") DO NOTHING"#), "{}", sql);
    }
}
