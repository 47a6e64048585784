//! Opaque SQL text for the stored procedures and tables the core reads from and writes to. Kept
//! as plain `&'static str` constants rather than a query builder: the procedures already encode
//! the business logic on the database side, and the Rust layer only needs to bind parameters and
//! read typed rows back.

pub mod tables {
    pub const SESSIONS: &str = "journal.sessions";
    pub const REVISED_SESSIONS: &str = "journal.revised_sessions";
    pub const NOTIFICATIONS: &str = "journal.notifications";
    pub const APNS_TOKENS: &str = "journal.apns_tokens";
    pub const MOVEMENTS: &str = "journal.movements";
    pub const DEVICE_DISPLACEMENTS: &str = "journal.device_displacements";
    pub const DEVICES: &str = "auth.devices";
    pub const PROFILES: &str = "auth.profiles";
    pub const PLAQUES: &str = "surrounding.plaques";
}

pub mod procedures {
    pub const REVISION_SESSIONS_FOR_MODIFIED_PLAQUES: &str =
        "select * from journal.revision_sessions_for_modified_plaques($1)";
    pub const REVISION_SESSIONS_FOR_DEVICE_DISPLACEMENT: &str =
        "select * from journal.revision_sessions_for_device_displacement($1)";
    pub const REGISTER_DEVICE: &str = "select * from auth.register_device($1, $2, $3)";
    pub const GET_SESSION: &str = "select * from journal.get_session($1, $2)";
    pub const SET_APNS_TOKEN: &str = "select journal.set_apns_token($1, $2)";
    pub const QUERY_PLAQUES_IN_SIGHT: &str = "select * from surrounding.query_plaques_in_sight($1, $2, $3)";
    pub const QUERY_PLAQUES_ON_MAP: &str = "select * from surrounding.query_plaques_on_map($1, $2)";
    pub const VERIFY_IP: &str = "select pool.verify_ip($1)";

    // Satellite command handlers.
    pub const AUTHENTICATE_DEVICE: &str = "select * from auth.authenticate_device($1)";
    pub const AUTHENTICATE_PROFILE: &str = "select * from auth.authenticate_profile($1, $2)";
    pub const VALIDATE_PROFILE_NAME: &str = "select auth.validate_profile_name($1)";
    pub const CREATE_PROFILE: &str = "select * from auth.create_profile($1, $2, $3)";
    pub const CREATE_PLAQUE: &str = "select * from surrounding.create_plaque($1, $2, $3, $4)";
    pub const CHANGE_PLAQUE_LOCATION: &str = "select surrounding.change_plaque_location($1, $2, $3, $4)";
    pub const CHANGE_PLAQUE_ORIENTATION: &str = "select surrounding.change_plaque_orientation($1, $2, $3)";
    pub const CHANGE_PLAQUE_SIZE: &str = "select surrounding.change_plaque_size($1, $2, $3)";
    pub const CHANGE_PLAQUE_COLORS: &str = "select surrounding.change_plaque_colors($1, $2, $3)";
    pub const CHANGE_PLAQUE_FONT: &str = "select surrounding.change_plaque_font($1, $2, $3)";
    pub const CHANGE_PLAQUE_INSCRIPTION: &str = "select surrounding.change_plaque_inscription($1, $2)";
    pub const DOWNLOAD_PLAQUES: &str = "select * from surrounding.download_plaques($1)";
    pub const DISPLACEMENT_ON_RADAR: &str = "select * from journal.displacement_on_radar($1, $2, $3, $4)";
    pub const DISPLACEMENT_IN_SIGHT: &str = "select * from journal.displacement_in_sight($1, $2, $3, $4)";
    pub const DISPLACEMENT_ON_MAP: &str = "select * from journal.displacement_on_map($1, $2, $3, $4)";
    pub const REGISTER_MOVEMENT: &str = "select journal.register_movement($1, $2, $3, $4, $5, $6)";
    pub const SET_SESSION_ONLINE: &str = "select journal.set_session_online($1, $2)";
    pub const SET_SESSION_OFFLINE: &str = "select journal.set_session_offline($1)";
    pub const REPORT_MESSAGE: &str = "select journal.report_message($1, $2, $3)";
    pub const QUERY_PLAQUES_CHANGED_ON_RADAR: &str =
        "select plaque_token, plaque_revision, disappeared from journal.session_on_radar_plaques \
         join surrounding.plaques using (plaque_id) where session_id = $1 and on_radar_revision > $2";
    pub const QUERY_PLAQUES_CHANGED_IN_SIGHT: &str =
        "select plaque_token, plaque_revision, disappeared from journal.session_in_sight_plaques \
         join surrounding.plaques using (plaque_id) where session_id = $1 and in_sight_revision > $2";
    pub const QUERY_PLAQUES_CHANGED_ON_MAP: &str =
        "select plaque_token, plaque_revision, disappeared from journal.session_on_map_plaques \
         join surrounding.plaques using (plaque_id) where session_id = $1 and on_map_revision > $2";

    // Broadcaster.
    pub const DEQUEUE_REVISED_SESSIONS: &str = "select * from journal.dequeue_revised_sessions($1)";
    pub const MARK_SESSIONS_DELIVERED: &str = "select journal.mark_sessions_delivered($1)";

    // Messenger.
    pub const FETCH_OUTSTANDING_NOTIFICATIONS: &str = "select * from journal.fetch_outstanding_notifications($1)";
    pub const MARK_NOTIFICATION_SENT: &str = "select journal.mark_notification_sent($1)";
    pub const CLEAR_IN_MESSANGER: &str = "select journal.clear_in_messanger($1)";
    pub const RESET_STALE_IN_MESSANGER: &str = "select journal.reset_stale_in_messanger()";
}
