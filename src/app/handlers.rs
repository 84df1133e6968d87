use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::Mutex;
use tracing::warn;

use crate::config::Config;
use crate::core::caption::{
    boldify_body, boldify_full_caption, build_header_from_text, collapse_spaces, header_line,
    make_full_bold,
};
use crate::core::catalog::{pick_language, CatalogClient, CatalogMatch, UNKNOWN_YEAR};
use crate::core::imagehost::ImageHostClient;
use crate::core::media::{get_mediainfo_text, get_remote_size, parse_file_info};
use crate::core::naming;
use crate::core::posters;
use crate::core::share::ShareClient;
use crate::utils::{Error, FlixpostResult};

use super::telegram::{Bot, ChatMemberUpdated, Message, Update};

static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(19|20)\d{2}").unwrap());
static COMPLETE_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Complete name\s*:\s*(.+)").unwrap());
static NETFLIX_TITLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/title/(\d+)").unwrap());
static DIGITS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").unwrap());

const PROGRESS_TEXT: &str = "Wait :- 50%\n▰▰▰▰▰▱▱▱▱▱";

/// Caption and header of the most recent /get, /info, /ls or /tmdb post in a
/// chat, reused by the manual-poster flow.
#[derive(Debug, Clone, Default)]
struct ChatMemory {
    last_caption: Option<String>,
    header: Option<String>,
}

pub struct App {
    config: Config,
    bot: Bot,
    http: reqwest::Client,
    catalog: CatalogClient,
    share: ShareClient,
    imagehost: ImageHostClient,
    authorized_chats: Mutex<HashSet<i64>>,
    chat_memory: Mutex<HashMap<i64, ChatMemory>>,
}

impl App {
    pub fn new(config: Config) -> Self {
        let http = reqwest::Client::new();
        let bot = Bot::new(config.telegram.bot_token.clone(), http.clone());
        let catalog = CatalogClient::new(config.tmdb.api_key.clone(), http.clone());
        let share = ShareClient::new(config.gdflix.clone(), http.clone());
        let imagehost = ImageHostClient::new(config.imagehost.clone(), http.clone());
        Self {
            config,
            bot,
            http,
            catalog,
            share,
            imagehost,
            authorized_chats: Mutex::new(HashSet::new()),
            chat_memory: Mutex::new(HashMap::new()),
        }
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    // ============================================================================================
    // Dispatch
    // ============================================================================================

    pub async fn handle_update(self: Arc<Self>, update: Update) {
        if let Some(member) = update.my_chat_member {
            self.on_added_to_group(member).await;
            return;
        }
        let Some(msg) = update.message else { return };

        if let Some(text) = msg.text.clone() {
            if let Some((command, args)) = parse_command(&text) {
                let chat_id = msg.chat.id;
                if let Err(e) = self.dispatch_command(&command, &args, &msg).await {
                    warn!("/{command} failed: {e}");
                    let _ = self
                        .bot
                        .send_message(
                            chat_id,
                            &format!("⚠️ Something went wrong.\n\n<code>{e}</code>"),
                            true,
                            Some(msg.message_id),
                        )
                        .await;
                }
                return;
            }
        }

        if !msg.photo.is_empty() {
            if let Err(e) = self.manual_poster(&msg).await {
                warn!("manual poster failed: {e}");
            }
        }
    }

    async fn dispatch_command(&self, command: &str, args: &[String], msg: &Message) -> FlixpostResult<()> {
        match command {
            "start" => self.cmd_start(msg).await,
            "help" => self.cmd_help(msg).await,
            "authorize" => self.cmd_authorize(msg).await,
            "get" => self.cmd_get(msg, args).await,
            "info" => self.cmd_info(msg, args).await,
            "ls" => self.cmd_ls(msg, args).await,
            "tmdb" => self.cmd_tmdb(msg, args).await,
            "host" => self.cmd_host(msg, args).await,
            "nf" => self.cmd_netflix(msg, args).await,
            "rk" => self.cmd_repost(msg, args).await,
            other => {
                if let Some(provider) = posters::provider_for_command(other) {
                    self.cmd_stream_poster(msg, args, provider).await
                } else {
                    Ok(())
                }
            }
        }
    }

    // ============================================================================================
    // Access control
    // ============================================================================================

    fn is_allowed(&self, user_id: i64) -> bool {
        let allowed = &self.config.telegram.allowed_users;
        allowed.is_empty() || allowed.contains(&user_id)
    }

    /// Allow-list plus per-group authorization. Replies to the user and
    /// returns false when access is denied.
    async fn check_access(&self, msg: &Message) -> FlixpostResult<bool> {
        let user_id = msg.from.as_ref().map(|u| u.id).unwrap_or_default();
        if !self.is_allowed(user_id) {
            self.reply_plain(msg, "Not allowed.").await?;
            return Ok(false);
        }
        if msg.is_group() && !self.authorized_chats.lock().await.contains(&msg.chat.id) {
            self.reply_plain(
                msg,
                "This group is not authorized.\nBot owner must send /authorize here.",
            )
            .await?;
            return Ok(false);
        }
        Ok(true)
    }

    async fn reply_plain(&self, msg: &Message, text: &str) -> FlixpostResult<()> {
        self.bot
            .send_message(msg.chat.id, text, false, Some(msg.message_id))
            .await?;
        Ok(())
    }

    async fn remember(&self, chat_id: i64, caption: &str, header: &str) {
        let mut memory = self.chat_memory.lock().await;
        memory.insert(
            chat_id,
            ChatMemory {
                last_caption: Some(caption.to_string()),
                header: Some(header.to_string()),
            },
        );
    }

    /// Caption with poster when one could be downloaded, plain text otherwise.
    async fn send_captioned(&self, msg: &Message, caption: &str, image_url: Option<&str>, file_name: &str) -> FlixpostResult<()> {
        let poster_bytes = match image_url {
            Some(url) => self.catalog.download_poster_bytes(url).await,
            None => None,
        };
        match poster_bytes {
            Some(bytes) => {
                self.bot
                    .send_photo_bytes(msg.chat.id, file_name, bytes, caption, Some(msg.message_id))
                    .await?;
            }
            None => {
                self.bot
                    .send_message(msg.chat.id, caption, true, Some(msg.message_id))
                    .await?;
            }
        }
        Ok(())
    }

    // ============================================================================================
    // Basic commands
    // ============================================================================================

    async fn cmd_start(&self, msg: &Message) -> FlixpostResult<()> {
        let user = msg.from.as_ref();
        let name = user
            .and_then(|u| u.first_name.clone())
            .unwrap_or_else(|| "User".to_string());
        let uid = user.map(|u| u.id).unwrap_or_default();
        let profile_line = user
            .and_then(|u| u.username.as_ref())
            .map(|username| {
                format!("<b>Profile:</b> <a href=\"https://t.me/{username}\">https://t.me/{username}</a>\n")
            })
            .unwrap_or_default();
        let text = format!(
            "<b>Hello {name}!</b>\n\
<b>User ID:</b> <code>{uid}</code>\n\
{profile_line}\n\
<b>I am a Google Drive to GdFlix TMDB Poster Generator Bot 🫨</b>\n\n\
<b>/get</b> <b>Send Google Drive link, I will generate GdFlix link, TMDB poster and MediaInfo.</b>\n\n\
<b>Dev:</b> {dev_link}\n",
            dev_link = self.config.telegram.dev_link
        );
        self.send_with_optional_photo(msg.chat.id, &text, self.config.telegram.start_photo_url.as_deref())
            .await
    }

    async fn cmd_help(&self, msg: &Message) -> FlixpostResult<()> {
        let text = format!(
            "<b>🤖 GdFlix TMDB Bot - Help</b>\n\n\
🟢 <b>Basic</b>\n\
/start - Show welcome message\n\
/help - Show this help menu\n\
/authorize - (Owner only) Authorize this group for /get, /info, /ls etc.\n\n\
📥 <b>Media</b>\n\
/get - Drive links to GdFlix + TMDB poster + MediaInfo\n\
/info - Direct link MediaInfo + TMDB poster\n\
/ls - Single Drive link with TMDB backdrop\n\
/tmdb - TMDB poster from title/year or URL\n\
/host - Host an image, get a direct URL\n\
/nf - Netflix posters, /rk - repost under a streaming poster\n\n\
<b>Dev:</b> {dev_link}\n",
            dev_link = self.config.telegram.dev_link
        );
        self.send_with_optional_photo(msg.chat.id, &text, self.config.telegram.help_photo_url.as_deref())
            .await
    }

    async fn send_with_optional_photo(&self, chat_id: i64, text: &str, photo_url: Option<&str>) -> FlixpostResult<()> {
        if let Some(url) = photo_url.filter(|u| !u.is_empty()) {
            if self.bot.send_photo_ref(chat_id, url, text, None).await.is_ok() {
                return Ok(());
            }
        }
        self.bot.send_message(chat_id, text, true, None).await?;
        Ok(())
    }

    async fn cmd_authorize(&self, msg: &Message) -> FlixpostResult<()> {
        if !msg.is_group() {
            return self
                .reply_plain(msg, "Use /authorize inside the group you want to authorize.")
                .await;
        }
        let user_id = msg.from.as_ref().map(|u| u.id).unwrap_or_default();
        if let Some(owner) = self.config.telegram.owner_id {
            if user_id != owner {
                return self.reply_plain(msg, "Only bot owner can authorize this group.").await;
            }
        }
        self.authorized_chats.lock().await.insert(msg.chat.id);
        self.bot
            .send_message(msg.chat.id, "<b>Authorized!</b> Enjoy 😎", true, Some(msg.message_id))
            .await?;
        Ok(())
    }

    async fn on_added_to_group(&self, member: ChatMemberUpdated) {
        if !matches!(member.chat.kind.as_str(), "group" | "supergroup") {
            return;
        }
        let was_out = matches!(member.old_chat_member.status.as_str(), "left" | "kicked");
        let now_in = matches!(member.new_chat_member.status.as_str(), "member" | "administrator");
        if !(was_out && now_in) {
            return;
        }
        let title = member.chat.title.unwrap_or_default();
        let text = format!(
            "<b>Hello {title} 👋</b>\n\n\
<b>I am a Google Drive to GdFlix TMDB Poster Generator Bot 🫨</b>\n\n\
<b>Owner must use /authorize in this group first.</b>\n"
        );
        if let Err(e) = self
            .send_with_optional_photo(member.chat.id, &text, self.config.telegram.start_photo_url.as_deref())
            .await
        {
            warn!("group greeting failed: {e}");
        }
    }

    // ============================================================================================
    // /get: Drive links to GdFlix + TMDB + MediaInfo
    // ============================================================================================

    async fn cmd_get(&self, msg: &Message, args: &[String]) -> FlixpostResult<()> {
        if !self.check_access(msg).await? {
            return Ok(());
        }
        if args.is_empty() {
            return self.reply_plain(msg, "Usage:\n/get <one or more links>").await;
        }
        let urls: Vec<&String> = args.iter().filter(|a| a.starts_with("http")).collect();
        if urls.is_empty() {
            return self.reply_plain(msg, "No valid links found.").await;
        }
        if urls.len() > 8 {
            return self.reply_plain(msg, "Maximum 8 links allowed in one /get.").await;
        }

        let status = self.bot.send_message(msg.chat.id, PROGRESS_TEXT, false, None).await?;

        let mut drive_ids: Vec<String> = Vec::new();
        let mut media_source_url: Option<String> = None;
        for url in &urls {
            if naming::is_gdrive_link(url) {
                if let Some(id) = naming::extract_drive_id(url) {
                    drive_ids.push(id);
                }
            } else if naming::is_workers_link(url) {
                if let Some(id) = naming::extract_drive_id_from_workers(url) {
                    drive_ids.push(id);
                } else if media_source_url.is_none() {
                    media_source_url = naming::extract_workers_path(url);
                }
            }
        }

        let mut items: Vec<ShareItem> = Vec::new();
        let mut first_name_for_catalog: Option<String> = None;
        for id in &drive_ids {
            let Some(share) = self.share.share_file(id).await else {
                continue;
            };
            let raw_name = share.name.clone().unwrap_or_else(|| "Unknown".to_string());
            let size = share.size.unwrap_or(0);
            items.push(ShareItem {
                drive_id: id.clone(),
                name: naming::strip_extension(&raw_name),
                size_str: naming::human_readable_size(size),
                link: self.share.file_link(&share, id),
            });
            if first_name_for_catalog.is_none() {
                first_name_for_catalog = Some(raw_name);
            }
        }

        if media_source_url.is_none() {
            if let Some(id) = probe_source_id(&items, &drive_ids) {
                media_source_url = Some(naming::workers_link_from_drive_id(
                    id,
                    &self.config.workers.base,
                ));
            }
        }
        if media_source_url.is_none() && items.is_empty() {
            self.bot.delete_message(status.chat.id, status.message_id).await;
            return self
                .reply_plain(msg, "No valid GdFlix data or workers link to read media info.")
                .await;
        }

        let mut audio_summary = String::new();
        let mut audio_lang: Option<String> = None;
        if let Some(source) = &media_source_url {
            if let Some(text) = get_mediainfo_text(&self.http, source).await {
                if let Some(info) = parse_file_info(&text) {
                    audio_summary = info.summary;
                    audio_lang = info.primary_audio_language;
                }
                if first_name_for_catalog.is_none() {
                    first_name_for_catalog = complete_name(&text);
                }
            }
        }

        let resolved = match &first_name_for_catalog {
            Some(name) => self.resolve_catalog(name).await,
            None => Resolved::unknown(),
        };
        let language = pick_language(resolved.language_code.as_deref(), audio_lang.as_deref());

        let header = header_line(&resolved.title, &resolved.year);
        let mut lines = vec![header.clone(), format!("<b>🌐 Language: {language}</b>"), String::new()];
        for item in &items {
            lines.push(format!("<b>{} [{}]</b>", item.name, item.size_str));
            lines.push(format!("<b>{}</b>", item.link));
            lines.push(String::new());
        }
        if items.is_empty() {
            if let Some(source) = &media_source_url {
                let display = naming::strip_extension(&naming::file_name_from_url(source));
                let size_str = match get_remote_size(&self.http, source).await {
                    Some(size) => naming::human_readable_size(size),
                    None => "Unknown".to_string(),
                };
                lines.push(format!("<b>{display} [{size_str}]</b>"));
                lines.push(format!("<b>{source}</b>"));
                lines.push(String::new());
            }
        }
        if !audio_summary.is_empty() {
            lines.push(audio_summary.trim_end().to_string());
        }
        let caption = collapse_spaces(&lines.join("\n"));

        self.remember(msg.chat.id, &caption, &header).await;
        self.bot.delete_message(status.chat.id, status.message_id).await;
        self.send_captioned(msg, &caption, resolved.poster_url.as_deref(), "poster.jpg")
            .await
    }

    // ============================================================================================
    // /info: direct download link
    // ============================================================================================

    async fn cmd_info(&self, msg: &Message, args: &[String]) -> FlixpostResult<()> {
        if !self.check_access(msg).await? {
            return Ok(());
        }
        if args.is_empty() {
            return self.reply_plain(msg, "Usage:\n/info <direct download link>").await;
        }
        let Some(url) = args.iter().find(|a| a.starts_with("http")) else {
            return self.reply_plain(msg, "No valid link found.").await;
        };

        let status = self.bot.send_message(msg.chat.id, PROGRESS_TEXT, false, None).await?;

        let size_str = match get_remote_size(&self.http, url).await {
            Some(size) => naming::human_readable_size(size),
            None => "Unknown".to_string(),
        };
        let Some(text) = get_mediainfo_text(&self.http, url).await else {
            self.bot.delete_message(status.chat.id, status.message_id).await;
            return self
                .reply_plain(msg, "Could not read media info from this link.")
                .await;
        };
        let (audio_summary, audio_lang) = match parse_file_info(&text) {
            Some(info) => (info.summary, info.primary_audio_language),
            None => (String::new(), None),
        };

        let filename = complete_name(&text).unwrap_or_else(|| naming::file_name_from_url(url));
        let display_name = naming::strip_extension(&filename);

        let resolved = self.resolve_catalog(&display_name).await;
        let language = pick_language(resolved.language_code.as_deref(), audio_lang.as_deref());

        let header = header_line(&resolved.title, &resolved.year);
        let mut lines = vec![
            header.clone(),
            format!("<b>🌐 Language: {language}</b>"),
            String::new(),
            format!("<b>{display_name} [{size_str}]</b>"),
            String::new(),
        ];
        if !audio_summary.is_empty() {
            lines.push(audio_summary.trim_end().to_string());
        }
        let caption = collapse_spaces(&lines.join("\n"));

        self.remember(msg.chat.id, &caption, &header).await;
        self.bot.delete_message(status.chat.id, status.message_id).await;
        self.send_captioned(msg, &caption, resolved.poster_url.as_deref(), "poster.jpg")
            .await
    }

    // ============================================================================================
    // /ls: single Drive/workers link, backdrop instead of poster
    // ============================================================================================

    async fn cmd_ls(&self, msg: &Message, args: &[String]) -> FlixpostResult<()> {
        if !self.check_access(msg).await? {
            return Ok(());
        }
        if args.is_empty() {
            return self
                .reply_plain(msg, "Usage:\n/ls <Google Drive link or workers path>")
                .await;
        }
        let Some(url) = args.iter().find(|a| a.starts_with("http")) else {
            return self.reply_plain(msg, "No valid link found.").await;
        };
        if !(naming::is_gdrive_link(url) || naming::is_workers_link(url)) {
            return self
                .reply_plain(msg, "Only Google Drive or workers links are supported for /ls.")
                .await;
        }

        let status = self.bot.send_message(msg.chat.id, PROGRESS_TEXT, false, None).await?;

        let mut drive_id: Option<String> = None;
        let mut is_workers_path = false;
        if naming::is_gdrive_link(url) {
            drive_id = naming::extract_drive_id(url);
        } else {
            drive_id = naming::extract_drive_id_from_workers(url);
            if drive_id.is_none() && naming::extract_workers_path(url).is_some() {
                is_workers_path = true;
            }
        }
        if drive_id.is_none() && !is_workers_path {
            self.bot.delete_message(status.chat.id, status.message_id).await;
            return self
                .reply_plain(msg, "Could not extract Drive ID from this link.")
                .await;
        }

        let (raw_name, size, gdlink, media_source_url) = match &drive_id {
            Some(id) => {
                let Some(share) = self.share.share_file(id).await else {
                    self.bot.delete_message(status.chat.id, status.message_id).await;
                    return self
                        .reply_plain(msg, "GdFlix did not return any data for this file.")
                        .await;
                };
                let raw_name = share.name.clone().unwrap_or_else(|| "Unknown".to_string());
                let size = share.size.unwrap_or(0);
                let gdlink = self.share.file_link(&share, id);
                let media_url = naming::workers_link_from_drive_id(id, &self.config.workers.base);
                (raw_name, size, gdlink, media_url)
            }
            None => {
                let raw_name = naming::file_name_from_url(url);
                let size = get_remote_size(&self.http, url).await.unwrap_or(0);
                (raw_name, size, url.to_string(), url.to_string())
            }
        };
        let display_name = naming::strip_extension(&raw_name);

        let mut audio_summary = String::new();
        let mut audio_lang: Option<String> = None;
        if let Some(text) = get_mediainfo_text(&self.http, &media_source_url).await {
            if let Some(info) = parse_file_info(&text) {
                audio_summary = info.summary;
                audio_lang = info.primary_audio_language;
            }
        }

        let resolved = self.resolve_catalog(&display_name).await;
        let language = pick_language(resolved.language_code.as_deref(), audio_lang.as_deref());
        let backdrop_url = match &resolved.catalog_url {
            Some(catalog_url) => self.catalog.backdrop_from_catalog_url(catalog_url).await,
            None => None,
        };

        let header = header_line(&resolved.title, &resolved.year);
        let mut lines = vec![
            header.clone(),
            format!("<b>🌐 Language: {language}</b>"),
            String::new(),
            format!("<b>{display_name} [{}]</b>", naming::human_readable_size(size)),
            format!("<b>{gdlink}</b>"),
            String::new(),
        ];
        if !audio_summary.is_empty() {
            lines.push(audio_summary.trim_end().to_string());
        }
        let caption = collapse_spaces(&lines.join("\n"));

        self.remember(msg.chat.id, &caption, &header).await;
        self.bot.delete_message(status.chat.id, status.message_id).await;
        self.send_captioned(msg, &caption, backdrop_url.as_deref(), "backdrop.jpg")
            .await
    }

    // ============================================================================================
    // /tmdb: title/year text or a catalog URL
    // ============================================================================================

    async fn cmd_tmdb(&self, msg: &Message, args: &[String]) -> FlixpostResult<()> {
        if args.is_empty() {
            return self.reply_plain(msg, "Usage:\n/tmdb <title/year or TMDB URL>").await;
        }
        let raw = args.join(" ");

        let resolved = if raw.starts_with("http") && raw.contains("themoviedb.org") {
            match self.catalog.lookup_by_url(&raw).await {
                Some(m) => Resolved::from_match(m),
                None => return self.reply_plain(msg, "Invalid TMDB URL.").await,
            }
        } else {
            let (title, year) = match YEAR_RE.find(&raw) {
                Some(m) => {
                    let title = raw[..m.start()].trim();
                    let title = if title.is_empty() { raw.trim() } else { title };
                    (title.to_string(), m.as_str().to_string())
                }
                None => (raw.trim().to_string(), UNKNOWN_YEAR.to_string()),
            };
            match self.catalog.strict_match(&title, &year).await {
                Some(m) => Resolved::from_match(m),
                None => Resolved::not_found(&title, &year),
            }
        };
        let language = pick_language(resolved.language_code.as_deref(), None);

        let header = header_line(&resolved.title, &resolved.year);
        let caption = collapse_spaces(&format!("{header}\n<b>🌐 Language: {language}</b>"));
        self.remember(msg.chat.id, &caption, &header).await;
        self.send_captioned(msg, &caption, resolved.poster_url.as_deref(), "poster.jpg")
            .await
    }

    // ============================================================================================
    // /host: image hosting
    // ============================================================================================

    async fn cmd_host(&self, msg: &Message, args: &[String]) -> FlixpostResult<()> {
        let image_bytes = if let Some(reply) = msg.reply_to_message.as_deref() {
            match reply.photo.last() {
                Some(photo) => Some(self.bot.download_file(&photo.file_id).await?),
                None => None,
            }
        } else {
            None
        };
        let image_bytes = match (image_bytes, args.first()) {
            (Some(bytes), _) => bytes,
            (None, Some(image_url)) => {
                let resp = self.http.get(image_url).send().await;
                match resp {
                    Ok(r) if r.status().is_success() => r
                        .bytes()
                        .await
                        .map(|b| b.to_vec())
                        .map_err(|_| Error::Other("Image download failed".to_string()))?,
                    _ => return self.reply_plain(msg, "❌ Image download failed").await,
                }
            }
            (None, None) => {
                self.bot
                    .send_message(
                        msg.chat.id,
                        "❌ Reply to an image or use\n<code>/host &lt;image_url&gt;</code>",
                        true,
                        Some(msg.message_id),
                    )
                    .await?;
                return Ok(());
            }
        };

        let status = self
            .bot
            .send_message(msg.chat.id, "⏫ Uploading image...", false, Some(msg.message_id))
            .await?;
        match self.imagehost.upload(image_bytes).await {
            Ok(url) => {
                self.bot
                    .edit_message_text(
                        status.chat.id,
                        status.message_id,
                        &format!("✅ <b>Image Hosted Successfully</b>\n\n🔗 <code>{url}</code>"),
                        true,
                    )
                    .await?;
            }
            Err(e) => {
                self.bot
                    .edit_message_text(
                        status.chat.id,
                        status.message_id,
                        &format!("❌ Error:\n<code>{e}</code>"),
                        true,
                    )
                    .await?;
            }
        }
        Ok(())
    }

    // ============================================================================================
    // Streaming posters
    // ============================================================================================

    async fn cmd_stream_poster(
        &self,
        msg: &Message,
        args: &[String],
        provider: &posters::PosterProvider,
    ) -> FlixpostResult<()> {
        let stream_url = args.join(" ");
        if stream_url.is_empty() {
            return self.reply_plain(msg, &format!("Usage:\n{}", provider.usage)).await;
        }
        if provider.restricted {
            let user_id = msg.from.as_ref().map(|u| u.id).unwrap_or_default();
            if !self.is_allowed(user_id) {
                return self.reply_plain(msg, "Not allowed.").await;
            }
        }

        let status = self
            .bot
            .send_message(msg.chat.id, "🔍 Fetching...", false, Some(msg.message_id))
            .await?;
        match posters::fetch_stream_data(&self.http, provider.api_base, &stream_url).await {
            Ok(data) => {
                let text = posters::format_stream_reply(&data, provider.label, provider.portrait_label);
                self.bot
                    .edit_message_text(status.chat.id, status.message_id, &text, true)
                    .await?;
            }
            Err(err) => {
                self.bot
                    .edit_message_text(
                        status.chat.id,
                        status.message_id,
                        &format!("❌ Failed: <code>{err}</code>"),
                        true,
                    )
                    .await?;
            }
        }
        Ok(())
    }

    async fn cmd_netflix(&self, msg: &Message, args: &[String]) -> FlixpostResult<()> {
        if !self.check_access(msg).await? {
            return Ok(());
        }
        let raw = args.join(" ");
        if raw.is_empty() {
            return self.reply_plain(msg, "Usage:\n/nf <netflix url or id>").await;
        }
        let movie_id = if raw.starts_with("http") {
            NETFLIX_TITLE_RE.captures(&raw).map(|c| c[1].to_string())
        } else if DIGITS_RE.is_match(raw.trim()) {
            Some(raw.trim().to_string())
        } else {
            NETFLIX_TITLE_RE.captures(&raw).map(|c| c[1].to_string())
        };
        let Some(movie_id) = movie_id else {
            return self.reply_plain(msg, "Could not extract Netflix movie id.").await;
        };

        let status = self
            .bot
            .send_message(msg.chat.id, "🔍 Fetching Netflix data…", false, None)
            .await?;
        let api_url = format!("{}{movie_id}", self.config.posters.netflix_api);
        let data = match self
            .http
            .get(&api_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
        {
            Ok(r) => r.json::<serde_json::Value>().await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        let data = match data {
            Ok(d) => d,
            Err(e) => {
                self.bot.delete_message(status.chat.id, status.message_id).await;
                self.bot
                    .send_message(
                        msg.chat.id,
                        &format!("❌ Netflix API error:\n<code>{e}</code>"),
                        true,
                        Some(msg.message_id),
                    )
                    .await?;
                return Ok(());
            }
        };
        self.bot.delete_message(status.chat.id, status.message_id).await;

        let text = posters::format_netflix_reply(&data);
        self.bot
            .send_message(msg.chat.id, &text, true, Some(msg.message_id))
            .await?;
        Ok(())
    }

    // ============================================================================================
    // /rk: repost a cached caption under a streaming landscape poster
    // ============================================================================================

    async fn cmd_repost(&self, msg: &Message, args: &[String]) -> FlixpostResult<()> {
        let Some(reply) = msg.reply_to_message.as_deref() else {
            return self.reply_plain(msg, "❌ /rk must be used as reply to /get post").await;
        };
        let Some(stream_url) = args.first() else {
            return self.reply_plain(msg, "❌ Usage:\n/rk <streaming link>").await;
        };
        let raw_caption = reply.caption.clone().or_else(|| reply.text.clone());
        let Some(raw_caption) = raw_caption else {
            return self.reply_plain(msg, "❌ Replied message has no caption").await;
        };
        let base_caption = make_full_bold(&raw_caption);

        let status = self
            .bot
            .send_message(msg.chat.id, "🔍 Fetching streaming poster...", false, Some(msg.message_id))
            .await?;
        let Some(api) = posters::repost_api_for(stream_url) else {
            self.bot
                .edit_message_text(status.chat.id, status.message_id, "❌ Unsupported streaming platform", false)
                .await?;
            return Ok(());
        };
        let data = match posters::fetch_stream_data(&self.http, api, stream_url).await {
            Ok(d) => d,
            Err(err) => {
                self.bot
                    .edit_message_text(
                        status.chat.id,
                        status.message_id,
                        &format!("❌ API error\n<code>{err}</code>"),
                        true,
                    )
                    .await?;
                return Ok(());
            }
        };
        let Some(landscape) = posters::landscape_url(&data) else {
            self.bot
                .edit_message_text(status.chat.id, status.message_id, "❌ Landscape poster not found", false)
                .await?;
            return Ok(());
        };
        let Some(bytes) = self.catalog.download_poster_bytes(&landscape).await else {
            self.bot
                .edit_message_text(status.chat.id, status.message_id, "❌ Poster download failed", false)
                .await?;
            return Ok(());
        };
        self.bot.delete_message(status.chat.id, status.message_id).await;
        self.bot
            .send_photo_bytes(
                msg.chat.id,
                "streaming_landscape.jpg",
                bytes,
                &base_caption,
                Some(reply.message_id),
            )
            .await?;
        Ok(())
    }

    // ============================================================================================
    // Manual poster (photo with or without caption)
    // ============================================================================================

    async fn manual_poster(&self, msg: &Message) -> FlixpostResult<()> {
        let Some(photo) = msg.photo.last() else {
            return Ok(());
        };
        let reply_base = msg
            .reply_to_message
            .as_deref()
            .and_then(|r| r.caption.clone().or_else(|| r.text.clone()));
        let memory = self
            .chat_memory
            .lock()
            .await
            .get(&msg.chat.id)
            .cloned()
            .unwrap_or_default();

        let caption = if let Some(body) = &msg.caption {
            if msg.reply_to_message.is_some() {
                let header_source = memory.header.or(reply_base);
                let header = header_source.as_deref().and_then(build_header_from_text);
                let body_bold = boldify_body(body);
                match header {
                    Some(h) => format!("{h}\n\n{body_bold}"),
                    None => body_bold,
                }
            } else {
                boldify_body(body)
            }
        } else {
            let base = memory.last_caption.or(reply_base);
            match base {
                Some(base) => boldify_full_caption(&base),
                None => {
                    return self
                        .reply_plain(msg, "First use /tmdb or /get (or send caption) then send poster photo 🙂")
                        .await;
                }
            }
        };

        self.bot
            .send_photo_ref(msg.chat.id, &photo.file_id, &caption, None)
            .await?;
        Ok(())
    }

    // ============================================================================================
    // Catalog resolution shared by /get, /info, /ls
    // ============================================================================================

    async fn resolve_catalog(&self, raw_title: &str) -> Resolved {
        match self.catalog.strict_match(raw_title, UNKNOWN_YEAR).await {
            Some(m) => Resolved::from_match(m),
            None => Resolved::not_found(raw_title, UNKNOWN_YEAR),
        }
    }
}

/// Final display fields after a catalog lookup, falling back to the raw query
/// when the catalog had nothing.
struct Resolved {
    title: String,
    year: String,
    language_code: Option<String>,
    poster_url: Option<String>,
    catalog_url: Option<String>,
}

impl Resolved {
    fn from_match(m: CatalogMatch) -> Self {
        Self {
            title: m.title,
            year: m.year,
            language_code: m.language_code,
            poster_url: m.poster_url,
            catalog_url: m.catalog_url,
        }
    }

    fn not_found(raw_title: &str, raw_year: &str) -> Self {
        Self {
            title: if raw_title.is_empty() { "Unknown".to_string() } else { raw_title.to_string() },
            year: raw_year.to_string(),
            language_code: None,
            poster_url: None,
            catalog_url: None,
        }
    }

    fn unknown() -> Self {
        Self::not_found("Unknown", UNKNOWN_YEAR)
    }
}

/// One /get link whose share resolution succeeded.
struct ShareItem {
    drive_id: String,
    name: String,
    size_str: String,
    link: String,
}

/// Drive id to probe for mediainfo: the first id whose share resolved,
/// falling back to the first raw id when none did.
fn probe_source_id<'a>(items: &'a [ShareItem], drive_ids: &'a [String]) -> Option<&'a str> {
    items
        .first()
        .map(|i| i.drive_id.as_str())
        .or_else(|| drive_ids.first().map(String::as_str))
}

fn complete_name(mediainfo_text: &str) -> Option<String> {
    COMPLETE_NAME_RE
        .captures(mediainfo_text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

fn parse_command(text: &str) -> Option<(String, Vec<String>)> {
    let mut parts = text.split_whitespace();
    let first = parts.next()?;
    let cmd = first.strip_prefix('/')?;
    let cmd = cmd.split('@').next().unwrap_or(cmd).to_lowercase();
    if cmd.is_empty() {
        return None;
    }
    Some((cmd, parts.map(str::to_string).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_parsing() {
        let (cmd, args) = parse_command("/get https://a https://b").unwrap();
        assert_eq!(cmd, "get");
        assert_eq!(args, vec!["https://a", "https://b"]);

        let (cmd, args) = parse_command("/start@flixpost_bot").unwrap();
        assert_eq!(cmd, "start");
        assert!(args.is_empty());

        assert!(parse_command("hello").is_none());
        assert!(parse_command("/").is_none());
    }

    #[test]
    fn complete_name_extraction() {
        let text = "General\nComplete name : /data/Movie.2021.mkv \nDuration : 1 h";
        assert_eq!(complete_name(text).as_deref(), Some("/data/Movie.2021.mkv"));
        assert!(complete_name("no such line").is_none());
    }

    #[test]
    fn probe_prefers_a_resolved_share_over_the_first_raw_id() {
        let drive_ids = vec!["dead".to_string(), "alive".to_string()];
        // share resolution failed for "dead", succeeded for "alive"
        let items = vec![ShareItem {
            drive_id: "alive".to_string(),
            name: "Movie".to_string(),
            size_str: "1.0GB".to_string(),
            link: "https://gdlink.dev/file/k".to_string(),
        }];
        assert_eq!(probe_source_id(&items, &drive_ids), Some("alive"));

        // nothing resolved: fall back to the first raw id
        assert_eq!(probe_source_id(&[], &drive_ids), Some("dead"));
        assert_eq!(probe_source_id(&[], &[]), None);
    }

    #[test]
    fn not_found_keeps_the_raw_query() {
        let r = Resolved::not_found("Some.File.Name", "????");
        assert_eq!(r.title, "Some.File.Name");
        assert_eq!(r.year, "????");
        assert!(r.poster_url.is_none());
    }
}
