//! JSON message model carried inside IPC frames.
//!
//! Every frame payload (except raw PING/PONG) is a JSON object.  Outgoing
//! commands are [`CommandEnvelope`]s; incoming payloads are read through the
//! lenient [`Payload`] view so that unknown fields or new command/event names
//! never break decoding.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;
use uuid::Uuid;

/// Handshake protocol version sent in [`Handshake::v`].
pub const HANDSHAKE_VERSION: &str = "1";

/// Close codes sent by the desktop application in a CLOSE frame.
pub mod close_codes {
    pub const INVALID_CLIENT_ID: i64 = 4000;
    pub const INVALID_ORIGIN: i64 = 4001;
    pub const RATE_LIMITED: i64 = 4002;
    pub const TOKEN_REVOKED: i64 = 4003;
    pub const INVALID_VERSION: i64 = 4004;
    pub const INVALID_ENCODING: i64 = 4005;
}

/// Generates a fresh correlation nonce.
pub fn new_nonce() -> String {
    Uuid::new_v4().to_string()
}

// ── Open string enums ─────────────────────────────────────────────────────────

/// Declares a wire-string enum with an `Unknown(String)` fallback variant.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident => $wire:literal,)* }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant,)*
            /// A name this crate does not know about, kept verbatim.
            Unknown(String),
        }

        impl $name {
            /// Returns the name as it appears on the wire.
            pub fn as_str(&self) -> &str {
                match self {
                    $($name::$variant => $wire,)*
                    $name::Unknown(raw) => raw.as_str(),
                }
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                match value {
                    $($wire => $name::$variant,)*
                    other => $name::Unknown(other.to_string()),
                }
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                $name::from(value.as_str())
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.as_str().to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum! {
    /// Commands accepted by the desktop application (the `cmd` field).
    pub enum Command {
        Dispatch => "DISPATCH",
        Authorize => "AUTHORIZE",
        Authenticate => "AUTHENTICATE",
        GetGuild => "GET_GUILD",
        GetGuilds => "GET_GUILDS",
        GetChannel => "GET_CHANNEL",
        GetChannels => "GET_CHANNELS",
        Subscribe => "SUBSCRIBE",
        Unsubscribe => "UNSUBSCRIBE",
        SetUserVoiceSettings => "SET_USER_VOICE_SETTINGS",
        SelectVoiceChannel => "SELECT_VOICE_CHANNEL",
        GetSelectedVoiceChannel => "GET_SELECTED_VOICE_CHANNEL",
        SelectTextChannel => "SELECT_TEXT_CHANNEL",
        GetVoiceSettings => "GET_VOICE_SETTINGS",
        SetVoiceSettings => "SET_VOICE_SETTINGS",
        CaptureShortcut => "CAPTURE_SHORTCUT",
        SetCertifiedDevices => "SET_CERTIFIED_DEVICES",
        SetActivity => "SET_ACTIVITY",
        SendActivityJoinInvite => "SEND_ACTIVITY_JOIN_INVITE",
        CloseActivityRequest => "CLOSE_ACTIVITY_REQUEST",
        SetUserAchievement => "SET_USER_ACHIEVEMENT",
        GetUserAchievements => "GET_USER_ACHIEVEMENTS",
        GetActivityJoinTicket => "GET_ACTIVITY_JOIN_TICKET",
        SendGenericEvent => "SEND_GENERIC_EVENT",
        NetworkingSystemMetrics => "NETWORKING_SYSTEM_METRICS",
        NetworkingPeerMetrics => "NETWORKING_PEER_METRICS",
        NetworkingCreateToken => "NETWORKING_CREATE_TOKEN",
        GetSkus => "GET_SKUS",
        GetEntitlements => "GET_ENTITLEMENTS",
        GetNetworkingConfig => "GET_NETWORKING_CONFIG",
        StartPurchase => "START_PURCHASE",
        GetEntitlementTicket => "GET_ENTITLEMENT_TICKET",
        GetApplicationTicket => "GET_APPLICATION_TICKET",
        ValidateApplication => "VALIDATE_APPLICATION",
        OpenOverlayVoiceSettings => "OPEN_OVERLAY_VOICE_SETTINGS",
        OpenOverlayGuildInvite => "OPEN_OVERLAY_GUILD_INVITE",
        OpenOverlayActivityInvite => "OPEN_OVERLAY_ACTIVITY_INVITE",
        SetOverlayLocked => "SET_OVERLAY_LOCKED",
        DisconnectFromLobbyVoice => "DISCONNECT_FROM_LOBBY_VOICE",
        ConnectToLobbyVoice => "CONNECT_TO_LOBBY_VOICE",
        SearchLobbies => "SEARCH_LOBBIES",
        SendToLobby => "SEND_TO_LOBBY",
        DisconnectFromLobby => "DISCONNECT_FROM_LOBBY",
        ConnectToLobby => "CONNECT_TO_LOBBY",
        UpdateLobbyMember => "UPDATE_LOBBY_MEMBER",
        DeleteLobby => "DELETE_LOBBY",
        UpdateLobby => "UPDATE_LOBBY",
        CreateLobby => "CREATE_LOBBY",
        GetImage => "GET_IMAGE",
        BrowserHandoff => "BROWSER_HANDOFF",
        Overlay => "OVERLAY",
        GuildTemplateBrowser => "GUILD_TEMPLATE_BROWSER",
        GiftCodeBrowser => "GIFT_CODE_BROWSER",
        BraintreePopupBridgeCallback => "BRAINTREE_POPUP_BRIDGE_CALLBACK",
        ConnectionsCallback => "CONNECTIONS_CALLBACK",
        DeepLink => "DEEP_LINK",
        InviteBrowser => "INVITE_BROWSER",
        OpenInviteDialog => "OPEN_INVITE_DIALOG",
        AcceptActivityInvite => "ACCEPT_ACTIVITY_INVITE",
        ActivityInviteUser => "ACTIVITY_INVITE_USER",
        CloseActivityJoinRequest => "CLOSE_ACTIVITY_JOIN_REQUEST",
        SetVoiceSettings2 => "SET_VOICE_SETTINGS_2",
        SetUserVoiceSettings2 => "SET_USER_VOICE_SETTINGS_2",
        CreateChannelInvite => "CREATE_CHANNEL_INVITE",
        GetRelationships => "GET_RELATIONSHIPS",
    }
}

wire_enum! {
    /// Event names carried in the `evt` field of a DISPATCH payload.
    pub enum Event {
        Ready => "READY",
        Error => "ERROR",
        GuildStatus => "GUILD_STATUS",
        GuildCreate => "GUILD_CREATE",
        ChannelCreate => "CHANNEL_CREATE",
        VoiceChannelSelect => "VOICE_CHANNEL_SELECT",
        VoiceStateCreate => "VOICE_STATE_CREATE",
        VoiceStateUpdate => "VOICE_STATE_UPDATE",
        VoiceStateDelete => "VOICE_STATE_DELETE",
        VoiceSettingsUpdate => "VOICE_SETTINGS_UPDATE",
        VoiceConnectionStatus => "VOICE_CONNECTION_STATUS",
        SpeakingStart => "SPEAKING_START",
        SpeakingStop => "SPEAKING_STOP",
        MessageCreate => "MESSAGE_CREATE",
        MessageUpdate => "MESSAGE_UPDATE",
        MessageDelete => "MESSAGE_DELETE",
        NotificationCreate => "NOTIFICATION_CREATE",
        CaptureShortcutChange => "CAPTURE_SHORTCUT_CHANGE",
        ActivityJoin => "ACTIVITY_JOIN",
        ActivityJoinRequest => "ACTIVITY_JOIN_REQUEST",
        ActivitySpectate => "ACTIVITY_SPECTATE",
        CurrentUserUpdate => "CURRENT_USER_UPDATE",
        RelationshipUpdate => "RELATIONSHIP_UPDATE",
        VoiceSettingsUpdate2 => "VOICE_SETTINGS_UPDATE_2",
        GameJoin => "GAME_JOIN",
        GameSpectate => "GAME_SPECTATE",
        LobbyDelete => "LOBBY_DELETE",
        LobbyUpdate => "LOBBY_UPDATE",
        LobbyMemberConnect => "LOBBY_MEMBER_CONNECT",
        LobbyMemberDisconnect => "LOBBY_MEMBER_DISCONNECT",
        LobbyMemberUpdate => "LOBBY_MEMBER_UPDATE",
        LobbyMessage => "LOBBY_MESSAGE",
        Overlay => "OVERLAY",
        OverlayUpdate => "OVERLAY_UPDATE",
        EntitlementCreate => "ENTITLEMENT_CREATE",
        EntitlementDelete => "ENTITLEMENT_DELETE",
        UserAchievementUpdate => "USER_ACHIEVEMENT_UPDATE",
    }
}

// ── Outgoing payloads ─────────────────────────────────────────────────────────

/// HANDSHAKE payload: `{"v":"1","client_id":"<id>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    /// Handshake protocol version; always [`HANDSHAKE_VERSION`].
    pub v: String,
    /// Application ID from the developer portal.
    pub client_id: String,
}

impl Handshake {
    /// Creates a handshake for `client_id`.
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            v: HANDSHAKE_VERSION.to_string(),
            client_id: client_id.into(),
        }
    }
}

/// Command payload sent inside a MESSAGE frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    /// Command name.
    pub cmd: Command,
    /// Command arguments; an object, possibly empty.
    pub args: Value,
    /// Correlation token echoed back in the reply.
    pub nonce: String,
    /// Event name, used by SUBSCRIBE / UNSUBSCRIBE.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evt: Option<Event>,
}

impl CommandEnvelope {
    /// Creates an envelope with a freshly generated nonce.
    ///
    /// A `null` `args` is normalised to an empty object.
    pub fn new(cmd: Command, args: Value, evt: Option<Event>) -> Self {
        let args = if args.is_null() {
            Value::Object(Default::default())
        } else {
            args
        };
        Self {
            cmd,
            args,
            nonce: new_nonce(),
            evt,
        }
    }
}

// ── Incoming payloads ─────────────────────────────────────────────────────────

/// Lenient view of an incoming payload.
///
/// Replies look like `{"cmd":"<NAME>","data":{...},"nonce":"<uuid>"}`;
/// unsolicited dispatches look like
/// `{"cmd":"DISPATCH","evt":"<EVENT>","data":{...},"nonce":null}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// Command this payload answers, or `DISPATCH`.
    pub cmd: Command,
    /// Event name, present on dispatches and error replies.
    #[serde(default)]
    pub evt: Option<Event>,
    /// Event or reply data.
    #[serde(default)]
    pub data: Value,
    /// Correlation token of the request this payload answers.
    #[serde(default)]
    pub nonce: Option<String>,
}

impl Payload {
    /// Interprets a decoded JSON value as a payload.
    ///
    /// Returns `None` when the value is not an object with a string `cmd`.
    pub fn from_value(value: &Value) -> Option<Self> {
        match Payload::deserialize(value) {
            Ok(payload) => Some(payload),
            Err(e) => {
                trace!("value is not a command payload: {e}");
                None
            }
        }
    }

    /// Whether this is an unsolicited `DISPATCH`.
    pub fn is_dispatch(&self) -> bool {
        self.cmd == Command::Dispatch
    }

    /// Whether this payload reports an error (`evt: "ERROR"`).
    pub fn is_error(&self) -> bool {
        self.evt == Some(Event::Error)
    }

    /// Whether this is the READY dispatch that completes a login.
    pub fn is_ready(&self) -> bool {
        self.is_dispatch() && self.evt == Some(Event::Ready)
    }

    /// Extracts `{code, message}` from an error payload's data.
    pub fn error_data(&self) -> ErrorData {
        ErrorData::deserialize(&self.data).unwrap_or_else(|_| ErrorData {
            code: 0,
            message: self.data.to_string(),
        })
    }
}

/// `data` of an `evt: "ERROR"` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorData {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// Payload of a CLOSE frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseReason {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

impl CloseReason {
    /// Interprets a decoded CLOSE payload, tolerating missing fields.
    pub fn from_value(value: &Value) -> Self {
        CloseReason::deserialize(value).unwrap_or_else(|_| CloseReason {
            code: 0,
            message: value.to_string(),
        })
    }

    /// Whether the application rejected the handshake's client id.
    pub fn is_invalid_client_id(&self) -> bool {
        self.code == close_codes::INVALID_CLIENT_ID
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
