//! Blog / author / comment fixtures shared by the integration tests.
#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use sqlmapper::prelude::*;
use sqlmapper::{Connection, SqliteConnection};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const SCHEMA: &str = "
    CREATE TABLE author (author_id INTEGER PRIMARY KEY, author_name TEXT NOT NULL);
    CREATE TABLE blog (bid INTEGER PRIMARY KEY, name TEXT NOT NULL, author_id INTEGER);
    CREATE TABLE comment (comment_id INTEGER PRIMARY KEY, content TEXT NOT NULL, bid INTEGER NOT NULL);

    INSERT INTO author VALUES (1001, 'qingshan'), (1002, 'mic');
    INSERT INTO blog VALUES (1, 'RabbitMQ', 1001), (2, 'Kafka', 1001), (3, 'Redis', 1002);
    INSERT INTO comment VALUES (1, 'great', 1), (2, 'helpful', 1), (3, 'nice', 2);
";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blog {
    pub bid: i64,
    pub name: String,
    pub author_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Author {
    pub author_id: i64,
    pub author_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BlogAndAuthor {
    pub bid: i64,
    pub name: String,
    pub author: Option<Author>,
}

fn select(id: &str, sql: &str, result_map: &str) -> Statement {
    Statement::select(id, sql)
        .expect("valid select")
        .result_map(result_map)
}

/// The `BlogMapper` namespace.
pub fn blog_mapper() -> Namespace {
    Namespace::new("BlogMapper")
        .result_map(
            ResultMap::new("BaseResultMap", "Blog")
                .id("bid", "bid")
                .result("name", "name")
                .result("author_id", "author_id"),
        )
        .result_map(
            ResultMap::new("AuthorMap", "Author")
                .id("author_id", "author_id")
                .result("author_name", "author_name"),
        )
        .result_map(
            ResultMap::new("CommentMap", "Comment")
                .id("comment_id", "comment_id")
                .result("content", "content"),
        )
        .result_map(
            ResultMap::new("BlogWithAuthorResultMap", "BlogAndAuthor")
                .id("bid", "bid")
                .result("name", "name")
                .association(Association::nested_one("author", "AuthorMap")),
        )
        .result_map(
            ResultMap::new("BlogWithAuthorQueryMap", "BlogAndAuthor")
                .id("bid", "bid")
                .result("name", "name")
                .association(Association::query_one("author", "selectAuthor", "author_id")),
        )
        .result_map(
            ResultMap::new("BlogWithCommentMap", "BlogAndComment")
                .id("bid", "bid")
                .result("name", "name")
                .association(Association::nested_many("comments", "CommentMap")),
        )
        .result_map(
            ResultMap::new("AuthorWithBlogMap", "AuthorAndBlog")
                .id("author_id", "author_id")
                .result("author_name", "author_name")
                .association(
                    Association::nested_many("blogs", "BlogWithCommentMap").column_prefix("blog_"),
                ),
        )
        .statement(select(
            "selectBlogById",
            "SELECT bid, name, author_id FROM blog WHERE bid = #{bid}",
            "BaseResultMap",
        ))
        .statement(select(
            "selectBlogList",
            "SELECT bid, name, author_id FROM blog ORDER BY bid",
            "BaseResultMap",
        ))
        .statement(select(
            "selectBlogPage",
            "SELECT bid, name, author_id FROM blog ORDER BY bid LIMIT #{limit} OFFSET #{offset}",
            "BaseResultMap",
        ))
        .statement(select(
            "selectBlogByName",
            "SELECT bid, name, author_id FROM blog WHERE name = #{name}",
            "BaseResultMap",
        ))
        .statement(select(
            "selectBlogByNameLiteral",
            "SELECT bid, name, author_id FROM blog WHERE name = '${name}'",
            "BaseResultMap",
        ))
        .statement(select(
            "selectBlogListOrdered",
            "SELECT bid, name, author_id FROM blog ORDER BY ${column} DESC",
            "BaseResultMap",
        ))
        .statement(
            Statement::insert(
                "insertBlog",
                "INSERT INTO blog (bid, name, author_id) VALUES (#{bid}, #{name}, #{author_id})",
            )
            .expect("valid insert"),
        )
        .statement(
            Statement::update("updateBlogName", "UPDATE blog SET name = #{name} WHERE bid = #{bid}")
                .expect("valid update"),
        )
        .statement(
            Statement::delete("deleteBlog", "DELETE FROM blog WHERE bid = #{bid}")
                .expect("valid delete"),
        )
        .statement(select(
            "selectAuthor",
            "SELECT author_id, author_name FROM author WHERE author_id = #{author_id}",
            "AuthorMap",
        ))
        .statement(select(
            "selectBlogWithAuthorResult",
            "SELECT b.bid, b.name, a.author_id, a.author_name
               FROM blog b LEFT JOIN author a ON b.author_id = a.author_id
              WHERE b.bid = #{bid}",
            "BlogWithAuthorResultMap",
        ))
        .statement(select(
            "selectBlogWithAuthorQuery",
            "SELECT bid, name, author_id FROM blog WHERE bid = #{bid}",
            "BlogWithAuthorQueryMap",
        ))
        .statement(select(
            "selectBlogListWithAuthorQuery",
            "SELECT bid, name, author_id FROM blog ORDER BY bid",
            "BlogWithAuthorQueryMap",
        ))
        .statement(select(
            "selectBlogWithCommentById",
            "SELECT b.bid, b.name, c.comment_id, c.content
               FROM blog b LEFT JOIN comment c ON b.bid = c.bid
              WHERE b.bid = #{bid}
              ORDER BY c.comment_id",
            "BlogWithCommentMap",
        ))
        .statement(select(
            "selectAuthorWithBlog",
            "SELECT a.author_id, a.author_name,
                    b.bid AS blog_bid, b.name AS blog_name,
                    c.comment_id AS blog_comment_id, c.content AS blog_content
               FROM author a
               LEFT JOIN blog b ON a.author_id = b.author_id
               LEFT JOIN comment c ON b.bid = c.bid
              ORDER BY a.author_id, b.bid, c.comment_id",
            "AuthorWithBlogMap",
        ))
}

/// `BlogMapperExt` inherits `BlogMapper` and overrides `selectBlogList`.
pub fn blog_mapper_ext() -> Namespace {
    Namespace::new("BlogMapperExt")
        .extends("BlogMapper")
        .statement(
            Statement::select(
                "selectBlogList",
                "SELECT bid, name, author_id FROM blog WHERE author_id = #{author_id} ORDER BY bid",
            )
            .expect("valid select")
            .result_map("BlogMapper.BaseResultMap"),
        )
        .statement(
            Statement::select("countBlogs", "SELECT count(*) AS total FROM blog")
                .expect("valid select")
                .result_type("Count"),
        )
}

pub fn configuration(settings: Settings) -> Configuration {
    Configuration::builder()
        .settings(settings)
        .namespace(blog_mapper())
        .namespace(blog_mapper_ext())
        .build()
        .expect("valid configuration")
}

/// Every session gets its own fresh in-memory database.
pub fn memory_factory(settings: Settings) -> SessionFactory {
    let data_source = || -> sqlmapper::Result<Box<dyn Connection>> {
        let conn = SqliteConnection::open_memory()?;
        conn.execute_raw(SCHEMA)?;
        Ok(Box::new(conn))
    };
    SessionFactory::new(configuration(settings), data_source)
}

/// A database file removed on drop, for tests that need two sessions on
/// the same data.
pub struct TempDb {
    path: PathBuf,
}

impl TempDb {
    pub fn new(name: &str) -> Self {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let path = std::env::temp_dir().join(format!(
            "sqlmapper-{}-{}-{}.db",
            name,
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::SeqCst)
        ));
        let _ = std::fs::remove_file(&path);
        let conn = SqliteConnection::open_file(path.to_string_lossy().into_owned())
            .expect("open temp database");
        conn.execute_raw(SCHEMA).expect("create schema");
        Self { path }
    }

    pub fn factory(&self, settings: Settings) -> SessionFactory {
        SessionFactory::new(
            configuration(settings),
            SqliteConfig::file(self.path.to_string_lossy().into_owned()),
        )
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

pub fn text(entity: &Entity, property: &str) -> String {
    entity
        .get(property)
        .and_then(Value::as_str)
        .unwrap_or_else(|| panic!("{property} is not text on {entity:?}"))
        .to_string()
}

pub fn int(entity: &Entity, property: &str) -> i64 {
    entity
        .get(property)
        .and_then(Value::as_i64)
        .unwrap_or_else(|| panic!("{property} is not an integer on {entity:?}"))
}
