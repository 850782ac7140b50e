//! Builders for RSS and OPML fixtures served by the mock server.

#![allow(dead_code)]

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// One `<item>` of an RSS fixture.
#[derive(Debug, Clone)]
pub struct Episode {
    pub guid: String,
    pub title: String,
    /// Day of January 2024 (1..=31).
    pub day: u32,
    pub enclosure_url: String,
    pub mime: String,
}

impl Episode {
    /// Episode `n` published on 2024-01-`n`, enclosure at `{base}/ep/{n}.mp3`.
    pub fn numbered(base: &str, n: u32) -> Self {
        Self {
            guid: format!("ep-{n}"),
            title: format!("Episode {n}"),
            day: n,
            enclosure_url: format!("{base}/ep/{n}.mp3"),
            mime: "audio/mpeg".to_string(),
        }
    }

    pub fn with_mime(mut self, mime: &str) -> Self {
        self.mime = mime.to_string();
        self
    }

    /// Final filename the downloader derives for this episode.
    pub fn file_name(&self, ext: &str) -> String {
        format!("{} [2024-01-{:02}]{ext}", self.title, self.day)
    }

    fn pub_date(&self) -> String {
        // 2024-01-01 was a Monday.
        let weekday = WEEKDAYS[((self.day - 1) % 7) as usize];
        format!("{weekday}, {:02} Jan 2024 10:00:00 +0000", self.day)
    }

    fn to_xml(&self) -> String {
        format!(
            r#"<item>
  <title>{title}</title>
  <link>https://show.example/{guid}</link>
  <guid isPermaLink="false">{guid}</guid>
  <pubDate>{date}</pubDate>
  <enclosure url="{url}" length="0" type="{mime}"/>
</item>"#,
            title = self.title,
            guid = self.guid,
            date = self.pub_date(),
            url = self.enclosure_url,
            mime = self.mime,
        )
    }
}

/// An RSS 2.0 document listing `episodes` in order.
pub fn rss_feed(title: &str, episodes: &[Episode]) -> String {
    let items: String = episodes.iter().map(Episode::to_xml).collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
<channel>
  <title>{title}</title>
  <link>https://show.example</link>
  <description>fixture</description>
  {items}
</channel>
</rss>"#
    )
}

/// An OPML document with one `rss` outline per `(title, xml_url)`.
pub fn opml(feeds: &[(&str, String)]) -> String {
    let outlines: String = feeds
        .iter()
        .map(|(title, url)| {
            format!(r#"<outline type="rss" text="{title}" title="{title}" xmlUrl="{url}"/>"#)
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<opml version="2.0">
<head><title>Subscriptions</title></head>
<body>{outlines}</body>
</opml>"#
    )
}
