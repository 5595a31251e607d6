//! Wire protocol shared between the relay server and its clients.
//!
//! Messages are single UTF-8 datagrams: a command token followed by
//! `key=value` fields, all separated by `;`. Field order is not
//! significant and unknown keys are ignored, so older and newer clients
//! can talk to the same server.

/// Default UDP port the relay listens on.
pub const DEFAULT_PORT: u16 = 4321;
/// Session capacity. The protocol only knows player ids 1 and 2.
pub const MAX_PLAYERS: usize = 2;
/// Playfield width. Obstacles always spawn at this x coordinate and
/// scroll left on the client side.
pub const WORLD_WIDTH: f32 = 800.0;
/// Y coordinate of the ground line, shared with the client renderer.
pub const GROUND_Y: f32 = 40.0;
/// Lower bound (inclusive) for the delay between obstacle spawns.
pub const SPAWN_INTERVAL_MIN_MS: u64 = 900;
/// Upper bound (exclusive) for the delay between obstacle spawns.
pub const SPAWN_INTERVAL_MAX_MS: u64 = 1600;
/// Silence from a registered address after which it counts as gone.
pub const PLAYER_TIMEOUT_MS: u64 = 5000;
/// Receive buffer size; larger datagrams are truncated by the transport.
pub const MAX_DATAGRAM_SIZE: usize = 2048;

/// Height offsets above the ground line a flying hazard may use.
pub const FLYING_ALTITUDE_OFFSETS: [f32; 2] = [15.0, 30.0];

/// Hazard categories, tagged `t=0` / `t=1` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObstacleKind {
    Ground,
    Flying,
}

impl ObstacleKind {
    pub fn wire_tag(self) -> u8 {
        match self {
            ObstacleKind::Ground => 0,
            ObstacleKind::Flying => 1,
        }
    }

    pub fn from_wire_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(ObstacleKind::Ground),
            1 => Some(ObstacleKind::Flying),
            _ => None,
        }
    }
}

/// One spawned hazard. `id` increases monotonically per spawn and is
/// never reused; it stays server-side and is not an `OBST` wire field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obstacle {
    pub id: u32,
    pub kind: ObstacleKind,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Why a datagram could not be turned into a [`Message`].
///
/// The distinction matters to the server: a structurally broken `STATE`
/// is dropped without a reply, while anything else unparseable earns an
/// `ERROR` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Looked like a `STATE` message but had too few fields, a
    /// non-numeric value, or an id outside {1, 2}.
    MalformedState,
    /// Command token not part of the protocol, or a known command with
    /// unusable fields.
    Unrecognized,
}

/// Every message either side of the protocol can put on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    // Client to server
    Join,
    Ready,
    State { id: u8, x: f32, y: f32, duck: bool },
    Discover,
    Bye,

    // Server to client
    Assign { id: u8 },
    Count { players: usize },
    ReadyEcho { id: u8 },
    Start,
    Obstacle { x: f32, y: f32, width: f32, height: f32, kind: ObstacleKind },
    Full,
    Error { msg: String },
    DiscoverReply,
}

impl Message {
    /// Parses one trimmed datagram payload.
    pub fn parse(text: &str) -> Result<Message, ParseError> {
        let text = text.trim();
        let mut parts = text.split(';');
        let command = parts.next().unwrap_or("");
        let fields: Vec<&str> = parts.collect();

        match command {
            "JOIN" => Ok(Message::Join),
            "BYE" => Ok(Message::Bye),
            "BUSCAR_SERVIDOR" => Ok(Message::Discover),
            "SERVIDOR_AQUI" => Ok(Message::DiscoverReply),
            "START" => Ok(Message::Start),
            "FULL" => Ok(Message::Full),
            "READY" => {
                // A bare READY is the client request; with an id field it
                // is the server's lobby echo.
                match field_value(&fields, "id") {
                    None => Ok(Message::Ready),
                    Some(v) => {
                        let id = v.parse().map_err(|_| ParseError::Unrecognized)?;
                        Ok(Message::ReadyEcho { id })
                    }
                }
            }
            "STATE" => parse_state(&fields),
            "ASSIGN" => {
                let id = parse_field(&fields, "id").ok_or(ParseError::Unrecognized)?;
                Ok(Message::Assign { id })
            }
            "COUNT" => {
                let players = parse_field(&fields, "players").ok_or(ParseError::Unrecognized)?;
                Ok(Message::Count { players })
            }
            "OBST" => {
                let tag: u8 = parse_field(&fields, "t").ok_or(ParseError::Unrecognized)?;
                let kind = ObstacleKind::from_wire_tag(tag).ok_or(ParseError::Unrecognized)?;
                Ok(Message::Obstacle {
                    x: parse_field(&fields, "x").ok_or(ParseError::Unrecognized)?,
                    y: parse_field(&fields, "y").ok_or(ParseError::Unrecognized)?,
                    width: parse_field(&fields, "w").ok_or(ParseError::Unrecognized)?,
                    height: parse_field(&fields, "h").ok_or(ParseError::Unrecognized)?,
                    kind,
                })
            }
            "ERROR" => Ok(Message::Error {
                msg: field_value(&fields, "msg").unwrap_or("").to_string(),
            }),
            _ => Err(ParseError::Unrecognized),
        }
    }

    /// Serializes to the wire text, without a trailing newline.
    pub fn encode(&self) -> String {
        match self {
            Message::Join => "JOIN".to_string(),
            Message::Ready => "READY".to_string(),
            Message::State { id, x, y, duck } => {
                format!("STATE;id={};x={};y={};duck={}", id, x, y, *duck as u8)
            }
            Message::Discover => "BUSCAR_SERVIDOR".to_string(),
            Message::Bye => "BYE".to_string(),
            Message::Assign { id } => format!("ASSIGN;id={}", id),
            Message::Count { players } => format!("COUNT;players={}", players),
            Message::ReadyEcho { id } => format!("READY;id={};value=1", id),
            Message::Start => "START".to_string(),
            Message::Obstacle { x, y, width, height, kind } => {
                format!("OBST;x={};y={};w={};h={};t={}", x, y, width, height, kind.wire_tag())
            }
            Message::Full => "FULL".to_string(),
            Message::Error { msg } => format!("ERROR;msg={}", msg),
            Message::DiscoverReply => "SERVIDOR_AQUI".to_string(),
        }
    }
}

impl From<Obstacle> for Message {
    fn from(o: Obstacle) -> Self {
        Message::Obstacle {
            x: o.x,
            y: o.y,
            width: o.width,
            height: o.height,
            kind: o.kind,
        }
    }
}

/// Looks up the raw value of a `key=value` field, ignoring tokens that
/// are not in that shape.
fn field_value<'a>(fields: &[&'a str], key: &str) -> Option<&'a str> {
    fields.iter().find_map(|part| {
        let (k, v) = part.split_once('=')?;
        (k == key).then_some(v)
    })
}

fn parse_field<T: std::str::FromStr>(fields: &[&str], key: &str) -> Option<T> {
    field_value(fields, key)?.parse().ok()
}

/// `STATE` is parsed defensively: too few fields, a bad number, or an
/// id outside the two player slots yields [`ParseError::MalformedState`]
/// so the server can drop the packet without replying. Missing numeric
/// fields default to zero, matching lenient clients in the wild.
fn parse_state(fields: &[&str]) -> Result<Message, ParseError> {
    if fields.len() < 4 {
        return Err(ParseError::MalformedState);
    }

    let mut id: u8 = 0;
    let mut x: f32 = 0.0;
    let mut y: f32 = 0.0;
    let mut duck = false;

    for part in fields {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        match key {
            "id" => id = value.parse().map_err(|_| ParseError::MalformedState)?,
            "x" => x = value.parse().map_err(|_| ParseError::MalformedState)?,
            "y" => y = value.parse().map_err(|_| ParseError::MalformedState)?,
            "duck" => duck = value == "1" || value.eq_ignore_ascii_case("true"),
            _ => {}
        }
    }

    if id != 1 && id != 2 {
        return Err(ParseError::MalformedState);
    }

    Ok(Message::State { id, x, y, duck })
}
