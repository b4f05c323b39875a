use std::fs;
use std::io;
use std::path::Path;
use std::process;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use devconnect_client::{
    AuthResponse, ClientError, CommentNode, DevConnectClient, FeedPage, ImageUpload, Notification,
    Post, ReactionKind,
};
use futures::StreamExt;
use serde::Serialize;

const TOKEN_FILE: &str = ".devconnect_token";
const DEFAULT_HTTP_SERVER: &str = "http://127.0.0.1:8080";
const DEFAULT_GRPC_SERVER: &str = "http://127.0.0.1:50051";

#[derive(Debug, Parser)]
#[command(name = "devconnect-cli", version, about = "Command line client for devconnect-server")]
struct Cli {
    /// HTTP API address.
    #[arg(long, global = true, env = "DEVCONNECT_SERVER")]
    server: Option<String>,

    /// Notification gRPC address.
    #[arg(long, global = true, env = "DEVCONNECT_GRPC_ENDPOINT")]
    grpc_endpoint: Option<String>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Accounts and sessions.
    #[command(subcommand)]
    Auth(AuthCommand),
    /// Feeds and posts.
    #[command(subcommand)]
    Posts(PostsCommand),
    /// Threaded comments.
    #[command(subcommand)]
    Comments(CommentsCommand),
    /// Toggle a reaction on a post (requires token).
    React {
        #[arg(long)]
        post_id: i64,
        /// happy or sad.
        #[arg(long)]
        kind: ReactionKind,
    },
    /// Profiles and follows.
    #[command(subcommand)]
    Users(UsersCommand),
    /// Notification inbox (requires token).
    #[command(subcommand)]
    Notifications(NotificationsCommand),
    /// Topic catalog.
    Topics,
}

#[derive(Debug, Subcommand)]
enum AuthCommand {
    /// Create a password account.
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Sign in with username and password.
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Print the consent page URL of an OAuth provider.
    OauthUrl {
        /// github or google.
        #[arg(long)]
        provider: String,
    },
    /// Finish an OAuth sign-in with the code and state from the redirect.
    OauthCallback {
        #[arg(long)]
        provider: String,
        #[arg(long)]
        code: String,
        #[arg(long)]
        state: String,
    },
    /// Pick a username after an OAuth sign-up.
    SetUsername {
        #[arg(long)]
        username: String,
    },
    /// Show the signed-in account.
    Me,
    /// Forget the saved token.
    Logout,
}

#[derive(Debug, Subcommand)]
enum PostsCommand {
    /// Global feed, newest first.
    Feed {
        #[command(flatten)]
        topics: TopicsArg,
        /// Number of 20-post pages to load.
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Posts of users you follow (requires token).
    Following,
    /// Posts of one user.
    ByUser {
        #[arg(long)]
        user_id: i64,
    },
    /// Show a post.
    Show {
        #[arg(long)]
        id: i64,
    },
    /// Publish a post (requires token).
    Create {
        #[arg(long)]
        content: String,
        #[command(flatten)]
        topics: TopicsArg,
        /// Image file to attach.
        #[arg(long)]
        image: Option<String>,
    },
    /// Delete your post (requires token).
    Delete {
        #[arg(long)]
        id: i64,
    },
}

#[derive(Debug, Args)]
struct TopicsArg {
    /// Topic ids, comma separated.
    #[arg(long, value_delimiter = ',')]
    topics: Vec<String>,
}

#[derive(Debug, Subcommand)]
enum CommentsCommand {
    /// Comments of a post as a reply tree.
    List {
        #[arg(long)]
        post_id: i64,
    },
    /// Comment on a post or reply to a comment (requires token).
    Add {
        #[arg(long)]
        post_id: i64,
        #[arg(long)]
        content: String,
        #[arg(long)]
        parent_id: Option<i64>,
    },
}

#[derive(Debug, Subcommand)]
enum UsersCommand {
    /// Public profile with follow counts.
    Profile {
        #[arg(long)]
        username: String,
    },
    /// Users someone follows.
    Following {
        #[arg(long)]
        user_id: i64,
    },
    /// Follow a user (requires token).
    Follow {
        #[arg(long)]
        user_id: i64,
    },
    /// Unfollow a user (requires token).
    Unfollow {
        #[arg(long)]
        user_id: i64,
    },
}

#[derive(Debug, Subcommand)]
enum NotificationsCommand {
    /// Latest notifications.
    List,
    /// Number of unread notifications.
    Unread,
    /// Mark notifications as read; all of them without `--id`.
    Read {
        #[arg(long = "id")]
        ids: Vec<i64>,
    },
    /// Print notifications as they arrive (needs the gRPC endpoint).
    Watch,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    if let Err(err) = run().await {
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let json = cli.json;

    let server = normalize_server(cli.server.unwrap_or_else(|| DEFAULT_HTTP_SERVER.to_string()));
    let grpc = normalize_server(
        cli.grpc_endpoint
            .unwrap_or_else(|| DEFAULT_GRPC_SERVER.to_string()),
    );
    let mut client = DevConnectClient::new(server)
        .map_err(map_client_error)?
        .with_grpc(grpc);

    let needs_session = !matches!(
        cli.command,
        Command::Auth(
            AuthCommand::Register { .. }
                | AuthCommand::Login { .. }
                | AuthCommand::OauthUrl { .. }
                | AuthCommand::OauthCallback { .. }
                | AuthCommand::Logout
        )
    );
    if needs_session {
        if let Some(token) = load_token().context("cannot read .devconnect_token")? {
            match client.resume(&token).await {
                Ok(_) => {}
                Err(ClientError::Unauthorized) => {
                    eprintln!("Saved token was rejected, continuing signed out");
                }
                Err(err) => return Err(map_client_error(err)),
            }
        }
    }

    match cli.command {
        Command::Auth(command) => run_auth(&mut client, command, json).await,
        Command::Posts(command) => run_posts(&client, command, json).await,
        Command::Comments(command) => run_comments(&client, command, json).await,
        Command::React { post_id, kind } => {
            let reactions = client
                .toggle_reaction(post_id, kind)
                .await
                .map_err(map_client_error)?;
            output(json, &reactions, || {
                println!(
                    "Post {post_id}: 😊 {}  😢 {}",
                    reactions.happy.len(),
                    reactions.sad.len()
                );
            })
        }
        Command::Users(command) => run_users(&client, command, json).await,
        Command::Notifications(command) => run_notifications(&client, command, json).await,
        Command::Topics => {
            let topics = client.topics().await.map_err(map_client_error)?;
            output(json, &topics, || {
                for topic in &topics {
                    println!("{:<12} {}", topic.id, topic.name);
                }
            })
        }
    }
}

async fn run_auth(client: &mut DevConnectClient, command: AuthCommand, json: bool) -> Result<()> {
    match command {
        AuthCommand::Register {
            username,
            email,
            password,
        } => {
            let auth = client
                .register(&username, &email, &password)
                .await
                .map_err(map_client_error)?;
            persist_token(client).context("cannot save token")?;
            output(json, &auth, || print_auth("Registered", &auth))
        }
        AuthCommand::Login { username, password } => {
            let auth = client
                .login(&username, &password)
                .await
                .map_err(map_client_error)?;
            persist_token(client).context("cannot save token")?;
            output(json, &auth, || print_auth("Signed in", &auth))
        }
        AuthCommand::OauthUrl { provider } => {
            let url = client
                .oauth_authorize_url(&provider)
                .await
                .map_err(map_client_error)?;
            output(json, &url, || {
                println!("Open this URL, then run `auth oauth-callback` with the code and state:");
                println!("{url}");
            })
        }
        AuthCommand::OauthCallback {
            provider,
            code,
            state,
        } => {
            let auth = client
                .complete_oauth(&provider, &code, &state)
                .await
                .map_err(map_client_error)?;
            persist_token(client).context("cannot save token")?;
            output(json, &auth, || {
                print_auth("Signed in", &auth);
                if auth.user.is_missing_username() {
                    println!("Pick a username with `auth set-username --username <name>`");
                }
            })
        }
        AuthCommand::SetUsername { username } => {
            let auth = client
                .set_username(&username)
                .await
                .map_err(map_client_error)?;
            persist_token(client).context("cannot save token")?;
            output(json, &auth, || print_auth("Username saved", &auth))
        }
        AuthCommand::Me => {
            let user = client.me().await.map_err(map_client_error)?;
            output(json, &user, || {
                println!("id: {}", user.id);
                println!("username: {}", user.username.as_deref().unwrap_or("-"));
                println!("email: {}", user.email);
                println!("provider: {}", user.provider);
            })
        }
        AuthCommand::Logout => {
            client.sign_out();
            remove_token().context("cannot remove token")?;
            println!("Signed out");
            Ok(())
        }
    }
}

async fn run_posts(client: &DevConnectClient, command: PostsCommand, json: bool) -> Result<()> {
    match command {
        PostsCommand::Feed { topics, pages } => {
            let mut loaded = client
                .feed_pages(&topics.topics)
                .await
                .map_err(map_client_error)?;
            while (loaded.len() as u32) < pages {
                match client
                    .fetch_next_page(&topics.topics)
                    .await
                    .map_err(map_client_error)?
                {
                    Some(page) => loaded.push(page),
                    None => break,
                }
            }
            output(json, &loaded, || print_feed(&loaded))
        }
        PostsCommand::Following => {
            let posts = client.following_posts().await.map_err(map_client_error)?;
            output(json, &posts, || print_posts(&posts))
        }
        PostsCommand::ByUser { user_id } => {
            let posts = client.user_posts(user_id).await.map_err(map_client_error)?;
            output(json, &posts, || print_posts(&posts))
        }
        PostsCommand::Show { id } => {
            let post = client.post(id).await.map_err(map_client_error)?;
            output(json, &post, || print_post(&post))
        }
        PostsCommand::Create {
            content,
            topics,
            image,
        } => {
            let image = image.as_deref().map(read_image).transpose()?;
            let post = client
                .create_post(&content, &topics.topics, image)
                .await
                .map_err(map_client_error)?;
            output(json, &post, || {
                println!("Post created");
                print_post(&post);
            })
        }
        PostsCommand::Delete { id } => {
            client.delete_post(id).await.map_err(map_client_error)?;
            println!("Post deleted: id={id}");
            Ok(())
        }
    }
}

async fn run_comments(
    client: &DevConnectClient,
    command: CommentsCommand,
    json: bool,
) -> Result<()> {
    match command {
        CommentsCommand::List { post_id } => {
            if json {
                let comments = client
                    .comments(&[post_id])
                    .await
                    .map_err(map_client_error)?;
                return print_json(&comments);
            }
            let tree = client.comment_tree(post_id).await.map_err(map_client_error)?;
            if tree.is_empty() {
                println!("No comments yet");
            }
            print_comment_tree(&tree, 0);
            Ok(())
        }
        CommentsCommand::Add {
            post_id,
            content,
            parent_id,
        } => {
            let comment = client
                .create_comment(post_id, &content, parent_id)
                .await
                .map_err(map_client_error)?;
            output(json, &comment, || println!("Comment added: id={}", comment.id))
        }
    }
}

async fn run_users(client: &DevConnectClient, command: UsersCommand, json: bool) -> Result<()> {
    match command {
        UsersCommand::Profile { username } => {
            let profile = client.profile(&username).await.map_err(map_client_error)?;
            let followers = client
                .follower_count(profile.id)
                .await
                .map_err(map_client_error)?;
            let following = client
                .following_count(profile.id)
                .await
                .map_err(map_client_error)?;
            output(json, &profile, || {
                println!(
                    "@{} ({})",
                    profile.username.as_deref().unwrap_or("-"),
                    profile.full_name.as_deref().unwrap_or("no name")
                );
                println!("id: {}", profile.id);
                println!("followers: {followers}, following: {following}");
                println!("joined: {}", profile.created_at);
            })
        }
        UsersCommand::Following { user_id } => {
            let users = client
                .followed_users(user_id)
                .await
                .map_err(map_client_error)?;
            output(json, &users, || {
                for user in &users {
                    println!("- [{}] @{}", user.id, user.username.as_deref().unwrap_or("-"));
                }
            })
        }
        UsersCommand::Follow { user_id } => {
            let follow = client.follow(user_id).await.map_err(map_client_error)?;
            output(json, &follow, || println!("Following user {user_id}"))
        }
        UsersCommand::Unfollow { user_id } => {
            client.unfollow(user_id).await.map_err(map_client_error)?;
            println!("Unfollowed user {user_id}");
            Ok(())
        }
    }
}

async fn run_notifications(
    client: &DevConnectClient,
    command: NotificationsCommand,
    json: bool,
) -> Result<()> {
    match command {
        NotificationsCommand::List => {
            let notifications = client.notifications().await.map_err(map_client_error)?;
            output(json, &notifications, || {
                if notifications.is_empty() {
                    println!("No notifications");
                }
                notifications.iter().for_each(print_notification);
            })
        }
        NotificationsCommand::Unread => {
            let unread = client.unread_count().await.map_err(map_client_error)?;
            output(json, &unread, || println!("Unread: {unread}"))
        }
        NotificationsCommand::Read { ids } => {
            let updated = client.mark_read(&ids).await.map_err(map_client_error)?;
            output(json, &updated, || println!("Marked as read: {updated}"))
        }
        NotificationsCommand::Watch => {
            let mut stream = client
                .watch_notifications()
                .await
                .map_err(map_client_error)?;
            println!("Waiting for notifications, Ctrl+C to stop");
            while let Some(item) = stream.next().await {
                let notification = item.map_err(map_client_error)?;
                if json {
                    println!("{}", serde_json::to_string(&notification)?);
                } else {
                    print_notification(&notification);
                }
            }
            println!("Stream closed by the server");
            Ok(())
        }
    }
}

fn normalize_server(server: String) -> String {
    if server.starts_with("http://") || server.starts_with("https://") {
        return server;
    }

    format!("http://{server}")
}

fn parse_token_content(raw: &str) -> Option<String> {
    let token = raw.trim().to_string();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

fn load_token() -> io::Result<Option<String>> {
    if !Path::new(TOKEN_FILE).exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(TOKEN_FILE)?;
    Ok(parse_token_content(&raw))
}

fn persist_token(client: &DevConnectClient) -> io::Result<()> {
    if let Some(token) = client.token() {
        fs::write(TOKEN_FILE, token)?;
    }
    Ok(())
}

fn remove_token() -> io::Result<()> {
    match fs::remove_file(TOKEN_FILE) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

fn image_content_type(path: &str) -> Option<&'static str> {
    let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

fn read_image(path: &str) -> Result<ImageUpload> {
    let Some(content_type) = image_content_type(path) else {
        bail!("unsupported image type: {path} (use png, jpg, gif or webp)");
    };
    let bytes = fs::read(path).with_context(|| format!("cannot read image {path}"))?;
    Ok(ImageUpload {
        content_type: content_type.to_string(),
        bytes,
    })
}

fn map_client_error(err: ClientError) -> anyhow::Error {
    let message = match err {
        ClientError::Unauthorized => {
            "authorization required: run `devconnect-cli auth login ...` or `devconnect-cli auth register ...`"
                .to_string()
        }
        ClientError::Forbidden(message) => format!("forbidden: {message}"),
        ClientError::NotFound => "not found".to_string(),
        ClientError::Conflict(message) => format!("conflict: {message}"),
        ClientError::InvalidRequest(message) => format!("invalid request: {message}"),
        ClientError::Server(message) => format!("server error: {message}"),
        ClientError::Http(err) => format!("HTTP error: {err}"),
        ClientError::GrpcStatus(status) => {
            format!(
                "gRPC error: code={:?}, message={}",
                status.code(),
                status.message()
            )
        }
        ClientError::GrpcTransport(err) => format!("gRPC connection error: {err}"),
        ClientError::Codec(err) => format!("cannot decode response: {err}"),
    };
    anyhow::anyhow!(message)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn output<T: Serialize>(json: bool, value: &T, human: impl FnOnce()) -> Result<()> {
    if json {
        return print_json(value);
    }
    human();
    Ok(())
}

fn print_auth(title: &str, auth: &AuthResponse) {
    println!("{title}");
    println!("token: {}", auth.access_token);
    println!("user:");
    println!("  id: {}", auth.user.id);
    println!(
        "  username: {}",
        auth.user.username.as_deref().unwrap_or("-")
    );
    println!("  email: {}", auth.user.email);
    println!("  provider: {}", auth.user.provider);
}

fn print_post(post: &Post) {
    println!(
        "[{}] @{} at {}",
        post.id,
        post.author.username.as_deref().unwrap_or("-"),
        post.created_at
    );
    println!("{}", post.content);
    if let Some(image) = &post.image_url {
        println!("image: {image}");
    }
    if !post.topics.is_empty() {
        println!("topics: {}", post.topics.join(", "));
    }
    println!(
        "😊 {}  😢 {}  💬 {}",
        post.reactions.happy.len(),
        post.reactions.sad.len(),
        post.comments_count
    );
}

fn print_posts(posts: &[Post]) {
    if posts.is_empty() {
        println!("No posts");
    }
    for post in posts {
        print_post(post);
        println!();
    }
}

fn print_feed(pages: &[FeedPage]) {
    let total = pages.first().map_or(0, |page| page.total);
    let shown: usize = pages.iter().map(|page| page.posts.len()).sum();
    println!("Posts: {shown} of {total}");
    println!();
    for page in pages {
        print_posts(&page.posts);
    }
}

fn print_comment_tree(nodes: &[CommentNode], depth: usize) {
    for node in nodes {
        println!(
            "{}- [{}] @{}: {}",
            "  ".repeat(depth),
            node.comment.id,
            node.comment.author.username.as_deref().unwrap_or("-"),
            node.comment.content
        );
        print_comment_tree(&node.replies, depth + 1);
    }
}

fn print_notification(notification: &Notification) {
    let marker = if notification.is_read { " " } else { "*" };
    println!(
        "{marker} [{}] {}: {} ({})",
        notification.id, notification.title, notification.message, notification.created_at
    );
}
