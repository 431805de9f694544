use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};

// Registration record sent to the sink. Field names on the wire are
// PascalCase, matching the spreadsheet's column headers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TeamRecord {
    // Moment the payload was accepted, not taken from the payload
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub university: String,
    pub team_name: String,
    pub bot_name: String,
    pub team_leader: String,
    pub leader_email: String,
    pub leader_phone: String,
    pub member2: String,
    pub member3: String,
}

impl TeamRecord {
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            university: String::new(),
            team_name: String::new(),
            bot_name: String::new(),
            team_leader: String::new(),
            leader_email: String::new(),
            leader_phone: String::new(),
            member2: String::new(),
            member3: String::new(),
        }
    }

    // Field a normalized payload key writes to
    fn field_mut(&mut self, key: &str) -> Option<&mut String> {
        match key {
            "university" => Some(&mut self.university),
            "name" | "team name" => Some(&mut self.team_name),
            "bot name" => Some(&mut self.bot_name),
            "team leader" => Some(&mut self.team_leader),
            "leader email" => Some(&mut self.leader_email),
            "leader phone" => Some(&mut self.leader_phone),
            "member 2" => Some(&mut self.member2),
            "member 3" => Some(&mut self.member3),
            _ => None,
        }
    }
}

// ISO 8601 with milliseconds and a Z suffix, e.g. 2024-03-01T09:30:00.125Z
fn serialize_timestamp<S: Serializer>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&timestamp.to_rfc3339_opts(SecondsFormat::Millis, true))
}

// Parse a "Key: value" per line payload. Never fails: unknown keys and
// lines without a colon are skipped, repeated keys keep the last value
pub fn parse_payload(payload: &str, timestamp: DateTime<Utc>) -> TeamRecord {
    let mut record = TeamRecord::empty(timestamp);

    for line in payload.lines() {
        // Value keeps any further colons, e.g. "a:b@x.com"
        let (key, value) = line.split_once(':').unwrap_or((line, ""));
        let key = key.trim().to_lowercase();

        if let Some(field) = record.field_mut(&key) {
            *field = value.trim().to_string();
        }
    }

    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap()
    }

    #[test]
    fn maps_known_fields() {
        let record = parse_payload("Team Name: Alpha\nBot Name: Striker\nUniversity: Tech U", at());

        assert_eq!(record.team_name, "Alpha");
        assert_eq!(record.bot_name, "Striker");
        assert_eq!(record.university, "Tech U");
        assert_eq!(record.team_leader, "");
        assert_eq!(record.member3, "");
        assert_eq!(record.timestamp, at());
    }

    #[test]
    fn full_payload() {
        let payload = "University: Tech U\r\n\
                       name: Alpha\r\n\
                       BOT NAME: Striker\r\n\
                       Team Leader: Ada Byte\r\n\
                       Leader Email: ada@techu.edu\r\n\
                       Leader Phone: +1 555 0100\r\n\
                       Member 2: Bo Bit\r\n\
                       Member 3: Cy Cle\r\n";
        let record = parse_payload(payload, at());

        assert_eq!(
            record,
            TeamRecord {
                timestamp: at(),
                university: "Tech U".into(),
                team_name: "Alpha".into(),
                bot_name: "Striker".into(),
                team_leader: "Ada Byte".into(),
                leader_email: "ada@techu.edu".into(),
                leader_phone: "+1 555 0100".into(),
                member2: "Bo Bit".into(),
                member3: "Cy Cle".into(),
            }
        );
    }

    #[test]
    fn empty_payload_gives_empty_record() {
        assert_eq!(parse_payload("", at()), TeamRecord::empty(at()));
    }

    #[test]
    fn last_value_wins() {
        let record = parse_payload("University: A\nUniversity: B", at());
        assert_eq!(record.university, "B");
    }

    #[test]
    fn unknown_keys_are_ignored() {
        assert_eq!(parse_payload("Foo: Bar", at()), TeamRecord::empty(at()));
    }

    #[test]
    fn colons_in_value_are_kept() {
        let record = parse_payload("Leader Email: a:b@x.com", at());
        assert_eq!(record.leader_email, "a:b@x.com");
    }

    #[test]
    fn lines_without_colon_and_blank_lines_are_skipped() {
        let record = parse_payload("\n\nuniversity\n  Bot Name :  Striker  \n\n", at());

        assert_eq!(record.university, "");
        assert_eq!(record.bot_name, "Striker");
    }

    #[test]
    fn serializes_with_column_names() {
        let mut record = parse_payload("Team Name: Alpha\nMember 2: Bo", at());
        record.timestamp = record.timestamp + chrono::Duration::milliseconds(125);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["Timestamp"], "2024-03-01T09:30:00.125Z");
        assert_eq!(json["TeamName"], "Alpha");
        assert_eq!(json["Member2"], "Bo");
        assert_eq!(json["LeaderEmail"], "");
        assert_eq!(json.as_object().unwrap().len(), 9);
    }
}
