use crate::{
    config::Config,
    error::{AppError, Result},
    models::{
        comment::{Comment, CommentFilter, ParentScope},
        follow::{FollowEdge, FollowState},
        like::{LikeSet, LikeToggle, SubjectKind},
        post::{Post, PostFilter, PostOrder},
        user::UserProfile,
    },
    services::store::BlogStore,
    utils::serde_helpers::thing_id,
};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use surrealdb::{
    engine::remote::http::{Client, Http},
    opt::auth::Root,
    Response, Surreal,
};
use tracing::{debug, error, info};

const POST_TABLE: &str = "post";
const COMMENT_TABLE: &str = "comment";
const USER_TABLE: &str = "user_profile";

// 这些字段以字符串形式存储并参与 ORDER BY
const TIMESTAMP_FIELDS: &[&str] = &["created_at", "updated_at", "published_at", "edited_at"];

const POST_FIELDS: &str = "*, array::len(likes) AS like_count";

/// SurrealDB 数据库服务
#[derive(Clone)]
pub struct Database {
    client: Surreal<Client>,
}

#[derive(Debug, Deserialize)]
struct CountRow {
    total: u64,
}

#[derive(Debug, Deserialize)]
struct GroupCountRow {
    post_id: String,
    total: u64,
}

#[derive(Debug, Deserialize)]
struct IdRow {
    #[serde(deserialize_with = "thing_id::deserialize")]
    #[allow(dead_code)]
    id: String,
}

#[derive(Debug, Deserialize)]
struct LikesRow {
    #[serde(default)]
    likes: LikeSet,
}

impl Database {
    /// 创建新的数据库连接
    pub async fn connect(config: &Config) -> Result<Self> {
        let address = config
            .database_url
            .trim_start_matches("http://")
            .trim_end_matches('/')
            .to_string();
        info!("Initializing database connection to {}", address);

        let client = Surreal::new::<Http>(address.as_str()).await?;
        client
            .signin(Root {
                username: &config.database_username,
                password: &config.database_password,
            })
            .await?;
        client
            .use_ns(config.database_namespace.as_str())
            .use_db(config.database_name.as_str())
            .await?;

        Ok(Self { client })
    }

    /// 执行带参数的查询
    async fn query_with_params(&self, sql: &str, params: Value) -> Result<Response> {
        debug!("Executing query: {}", sql.trim());
        let response = self.client.query(sql).bind(params).await?;
        response.check().map_err(|e| {
            error!("Query failed: {}", e);
            AppError::from(e)
        })
    }

    async fn fetch<T: DeserializeOwned>(&self, sql: &str, params: Value) -> Result<Vec<T>> {
        let mut response = self.query_with_params(sql, params).await?;
        Ok(response.take(0)?)
    }

    async fn fetch_one<T: DeserializeOwned>(&self, sql: &str, params: Value) -> Result<Option<T>> {
        Ok(self.fetch(sql, params).await?.into_iter().next())
    }

    async fn count(&self, sql: &str, params: Value) -> Result<u64> {
        let rows: Vec<CountRow> = self.fetch(sql, params).await?;
        Ok(rows.into_iter().next().map(|row| row.total).unwrap_or(0))
    }

    async fn create<T>(&self, table: &str, id: &str, record: &T) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let sql = format!("CREATE type::thing('{}', $id) CONTENT $doc", table);
        let doc = document(record, &["id"])?;
        self.fetch_one(&sql, json!({ "id": id, "doc": doc }))
            .await?
            .ok_or_else(|| AppError::internal("Failed to create record"))
    }

    async fn merge<T>(&self, table: &str, id: &str, record: &T, skip: &[&str]) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
    {
        let sql = format!(
            "UPDATE {} MERGE $doc WHERE id = type::thing('{}', $id) RETURN AFTER",
            table, table
        );
        let doc = document(record, skip)?;
        self.fetch_one(&sql, json!({ "id": id, "doc": doc })).await
    }

    async fn delete_where(&self, table: &str, condition: &str, params: Value) -> Result<u64> {
        let sql = format!("DELETE {} WHERE {} RETURN BEFORE", table, condition);
        let rows: Vec<IdRow> = self.fetch(&sql, params).await?;
        Ok(rows.len() as u64)
    }
}

/// Serializes a record into a document body without the listed fields.
fn document<T: Serialize>(record: &T, skip: &[&str]) -> Result<Value> {
    let mut value = serde_json::to_value(record)?;
    if let Value::Object(map) = &mut value {
        for field in skip {
            map.remove(*field);
        }
    }
    normalize_timestamps(&mut value);
    Ok(value)
}

/// Fixed-width RFC 3339 (nanoseconds, `Z`), so string order matches time order.
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Rewrites every timestamp field, including those nested in `likes`, to [`timestamp`].
fn normalize_timestamps(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, field) in map.iter_mut() {
                if TIMESTAMP_FIELDS.contains(&key.as_str()) {
                    let parsed = field
                        .as_str()
                        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok());
                    if let Some(at) = parsed {
                        *field = Value::String(timestamp(&at.with_timezone(&Utc)));
                        continue;
                    }
                }
                normalize_timestamps(field);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(normalize_timestamps),
        _ => {}
    }
}

/// Builds the WHERE clause and bindings for a post filter.
///
/// The count query and the data query both use this, so they always agree.
fn post_conditions(filter: &PostFilter) -> (String, Map<String, Value>) {
    let mut clauses = Vec::new();
    let mut params = Map::new();

    if let Some(status) = filter.status {
        clauses.push("status = $status".to_string());
        params.insert("status".into(), json!(status.as_str()));
    }
    if let Some(category) = &filter.category {
        clauses.push("string::contains(string::lowercase(category), $category)".to_string());
        params.insert("category".into(), json!(category));
    }
    if !filter.tags.is_empty() {
        clauses.push("tags CONTAINSANY $tags".to_string());
        params.insert("tags".into(), json!(filter.tags));
    }
    if let Some(author_id) = &filter.author_id {
        clauses.push("author_id = $author_id".to_string());
        params.insert("author_id".into(), json!(author_id));
    }
    if !filter.search_terms.is_empty() {
        let alternatives: Vec<String> = filter
            .search_terms
            .iter()
            .enumerate()
            .map(|(i, term)| {
                let key = format!("term{}", i);
                params.insert(key.clone(), json!(term));
                format!(
                    "string::contains(string::lowercase(title), ${k}) \
                     OR string::contains(string::lowercase(body), ${k}) \
                     OR string::contains(string::lowercase(category), ${k}) \
                     OR string::contains(array::join(tags, ' '), ${k})",
                    k = key
                )
            })
            .collect();
        clauses.push(format!("({})", alternatives.join(" OR ")));
    }

    (where_clause(&clauses), params)
}

fn comment_conditions(filter: &CommentFilter) -> (String, Map<String, Value>) {
    let mut clauses = Vec::new();
    let mut params = Map::new();

    if let Some(post_id) = &filter.post_id {
        clauses.push("post_id = $post_id".to_string());
        params.insert("post_id".into(), json!(post_id));
    }
    if let Some(author_id) = &filter.author_id {
        clauses.push("author_id = $author_id".to_string());
        params.insert("author_id".into(), json!(author_id));
    }
    match &filter.parent {
        ParentScope::Any => {}
        ParentScope::TopLevel => {
            clauses.push("(parent_id = NONE OR parent_id = NULL)".to_string());
        }
        ParentScope::RepliesTo(ids) => {
            clauses.push("parent_id IN $parent_ids".to_string());
            params.insert("parent_ids".into(), json!(ids));
        }
    }

    (where_clause(&clauses), params)
}

fn where_clause(clauses: &[String]) -> String {
    if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    }
}

fn order_clause(order: PostOrder) -> &'static str {
    match order {
        PostOrder::Newest => "ORDER BY created_at DESC, id DESC",
        PostOrder::Oldest => "ORDER BY created_at ASC, id ASC",
        PostOrder::Popular => "ORDER BY views DESC, like_count DESC, created_at DESC, id DESC",
    }
}

#[async_trait]
impl BlogStore for Database {
    async fn ping(&self) -> Result<()> {
        self.query_with_params("INFO FOR DB", json!({})).await?;
        debug!("Database connection verified successfully");
        Ok(())
    }

    async fn insert_post(&self, post: Post) -> Result<Post> {
        self.create(POST_TABLE, &post.id, &post).await
    }

    async fn get_post(&self, id: &str) -> Result<Option<Post>> {
        self.fetch_one(
            "SELECT * FROM type::thing('post', $id)",
            json!({ "id": id }),
        )
        .await
    }

    async fn get_post_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        self.fetch_one(
            "SELECT * FROM post WHERE slug = $slug LIMIT 1",
            json!({ "slug": slug }),
        )
        .await
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        let total = self
            .count(
                "SELECT count() AS total FROM post WHERE slug = $slug GROUP ALL",
                json!({ "slug": slug }),
            )
            .await?;
        Ok(total > 0)
    }

    async fn save_post(&self, post: Post) -> Result<Option<Post>> {
        let id = post.id.clone();
        self.merge(POST_TABLE, &id, &post, &["id", "likes", "views"]).await
    }

    async fn delete_post(&self, id: &str) -> Result<bool> {
        let deleted = self
            .delete_where(POST_TABLE, "id = type::thing('post', $id)", json!({ "id": id }))
            .await?;
        Ok(deleted > 0)
    }

    async fn increment_views(&self, id: &str) -> Result<Option<Post>> {
        self.fetch_one(
            "UPDATE post SET views += 1 WHERE id = type::thing('post', $id) RETURN AFTER",
            json!({ "id": id }),
        )
        .await
    }

    async fn find_posts(
        &self,
        filter: &PostFilter,
        order: PostOrder,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Post>> {
        let (conditions, mut params) = post_conditions(filter);
        params.insert("limit".into(), json!(limit));
        params.insert("start".into(), json!(offset));
        let sql = format!(
            "SELECT {} FROM post {} {} LIMIT $limit START $start",
            POST_FIELDS,
            conditions,
            order_clause(order)
        );
        self.fetch(&sql, Value::Object(params)).await
    }

    async fn find_all_posts(&self, filter: &PostFilter) -> Result<Vec<Post>> {
        let (conditions, params) = post_conditions(filter);
        let sql = format!("SELECT * FROM post {}", conditions);
        self.fetch(&sql, Value::Object(params)).await
    }

    async fn count_posts(&self, filter: &PostFilter) -> Result<u64> {
        let (conditions, params) = post_conditions(filter);
        let sql = format!("SELECT count() AS total FROM post {} GROUP ALL", conditions);
        self.count(&sql, Value::Object(params)).await
    }

    async fn posts_liked_by(&self, user_id: &str) -> Result<Vec<(Post, DateTime<Utc>)>> {
        let posts: Vec<Post> = self
            .fetch(
                "SELECT * FROM post WHERE status = 'published' AND likes.user_id CONTAINS $user_id",
                json!({ "user_id": user_id }),
            )
            .await?;

        let mut liked: Vec<(Post, DateTime<Utc>)> = posts
            .into_iter()
            .filter_map(|post| post.likes.liked_at(user_id).map(|at| (post, at)))
            .collect();
        liked.sort_by(|(a, a_at), (b, b_at)| b_at.cmp(a_at).then_with(|| b.id.cmp(&a.id)));
        Ok(liked)
    }

    async fn insert_comment(&self, comment: Comment) -> Result<Comment> {
        self.create(COMMENT_TABLE, &comment.id, &comment).await
    }

    async fn get_comment(&self, id: &str) -> Result<Option<Comment>> {
        self.fetch_one(
            "SELECT * FROM type::thing('comment', $id)",
            json!({ "id": id }),
        )
        .await
    }

    async fn save_comment(&self, comment: Comment) -> Result<Option<Comment>> {
        let id = comment.id.clone();
        self.merge(COMMENT_TABLE, &id, &comment, &["id", "likes"]).await
    }

    async fn find_comments(&self, filter: &CommentFilter) -> Result<Vec<Comment>> {
        let (conditions, params) = comment_conditions(filter);
        let sql = format!("SELECT * FROM comment {}", conditions);
        self.fetch(&sql, Value::Object(params)).await
    }

    async fn count_comments(&self, filter: &CommentFilter) -> Result<u64> {
        let (conditions, params) = comment_conditions(filter);
        let sql = format!("SELECT count() AS total FROM comment {} GROUP ALL", conditions);
        self.count(&sql, Value::Object(params)).await
    }

    async fn comment_counts(&self, post_ids: &[String]) -> Result<HashMap<String, u64>> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<GroupCountRow> = self
            .fetch(
                "SELECT post_id, count() AS total FROM comment WHERE post_id IN $ids GROUP BY post_id",
                json!({ "ids": post_ids }),
            )
            .await?;
        Ok(rows.into_iter().map(|row| (row.post_id, row.total)).collect())
    }

    async fn delete_comments(&self, ids: &[String]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.delete_where(COMMENT_TABLE, "meta::id(id) IN $ids", json!({ "ids": ids }))
            .await
    }

    async fn delete_comments_for_post(&self, post_id: &str) -> Result<u64> {
        self.delete_where(COMMENT_TABLE, "post_id = $post_id", json!({ "post_id": post_id }))
            .await
    }

    async fn toggle_like(
        &self,
        kind: SubjectKind,
        subject_id: &str,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<LikeToggle>> {
        // 单条 UPDATE 语句内完成成员检查与写入
        let sql = format!(
            r#"
                UPDATE {table} SET likes = IF likes.user_id CONTAINS $user_id
                    THEN likes[WHERE user_id != $user_id]
                    ELSE array::append(likes, {{ user_id: $user_id, created_at: $at }})
                END
                WHERE id = type::thing('{table}', $id)
                RETURN AFTER
            "#,
            table = kind.table()
        );
        let row: Option<LikesRow> = self
            .fetch_one(&sql, json!({ "id": subject_id, "user_id": user_id, "at": timestamp(&at) }))
            .await?;
        Ok(row.map(|row| LikeToggle::from_set(&row.likes, user_id)))
    }

    async fn get_user(&self, id: &str) -> Result<Option<UserProfile>> {
        self.fetch_one(
            "SELECT * FROM type::thing('user_profile', $id)",
            json!({ "id": id }),
        )
        .await
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<UserProfile>> {
        self.fetch_one(
            "SELECT * FROM user_profile WHERE username = $username LIMIT 1",
            json!({ "username": username }),
        )
        .await
    }

    async fn get_users(&self, ids: &[String]) -> Result<Vec<UserProfile>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.fetch(
            "SELECT * FROM user_profile WHERE meta::id(id) IN $ids",
            json!({ "ids": ids }),
        )
        .await
    }

    async fn insert_user(&self, user: UserProfile) -> Result<UserProfile> {
        self.create(USER_TABLE, &user.id, &user).await
    }

    async fn save_user(&self, user: UserProfile) -> Result<Option<UserProfile>> {
        let id = user.id.clone();
        self.merge(USER_TABLE, &id, &user, &["id", "followers", "following"])
            .await
    }

    async fn search_users(&self, term: &str, offset: usize, limit: usize) -> Result<Vec<UserProfile>> {
        self.fetch(
            r#"
                SELECT * FROM user_profile
                WHERE string::contains(string::lowercase(username), $term)
                    OR string::contains(string::lowercase(display_name), $term)
                ORDER BY username ASC, id ASC
                LIMIT $limit START $start
            "#,
            json!({ "term": term.to_lowercase(), "limit": limit, "start": offset }),
        )
        .await
    }

    async fn count_users(&self, term: &str) -> Result<u64> {
        self.count(
            r#"
                SELECT count() AS total FROM user_profile
                WHERE string::contains(string::lowercase(username), $term)
                    OR string::contains(string::lowercase(display_name), $term)
                GROUP ALL
            "#,
            json!({ "term": term.to_lowercase() }),
        )
        .await
    }

    async fn set_follow(&self, edge: &FollowEdge, follow: bool) -> Result<Option<FollowState>> {
        let existing = self
            .get_users(&[edge.follower_id.clone(), edge.followee_id.clone()])
            .await?;
        if existing.len() < 2 {
            return Ok(None);
        }

        let sql = if follow {
            r#"
                BEGIN TRANSACTION;
                UPDATE user_profile SET following = array::union(following, [$followee_id])
                    WHERE id = type::thing('user_profile', $follower_id);
                UPDATE user_profile SET followers = array::union(followers, [$follower_id])
                    WHERE id = type::thing('user_profile', $followee_id);
                COMMIT TRANSACTION;
            "#
        } else {
            r#"
                BEGIN TRANSACTION;
                UPDATE user_profile SET following -= $followee_id
                    WHERE id = type::thing('user_profile', $follower_id);
                UPDATE user_profile SET followers -= $follower_id
                    WHERE id = type::thing('user_profile', $followee_id);
                COMMIT TRANSACTION;
            "#
        };
        self.query_with_params(
            sql,
            json!({ "follower_id": edge.follower_id, "followee_id": edge.followee_id }),
        )
        .await?;

        let followee = self.get_user(&edge.followee_id).await?;
        Ok(followee.map(|user| FollowState {
            is_following: user.followers.contains(&edge.follower_id),
            follower_count: user.followers.len() as u64,
        }))
    }
}
