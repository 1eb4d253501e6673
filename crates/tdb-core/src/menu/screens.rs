//! One pure render function per menu node. Edges are the routes of the buttons each node emits.

use crate::{
    domain::{ChatGroup, ConfigField, GameplayType, QuickThereConfig},
    params::CallbackParams,
    route::Action,
};

use super::{
    keyboard::{Button, Screen},
    MenuSettings,
};

/// Everything a screen needs, already fetched and authorized.
#[derive(Clone, Debug, PartialEq)]
pub enum ScreenContext {
    MainMenu,
    JoinedGroups {
        groups: Vec<ChatGroup>,
    },
    JoinedGroupDetail {
        group: ChatGroup,
    },
    AdminGroups {
        groups: Vec<ChatGroup>,
    },
    AddAdminGroup,
    GroupConfig {
        group: ChatGroup,
        odds: Option<QuickThereConfig>,
        notice: Option<String>,
    },
    GameplaySelector {
        group: ChatGroup,
    },
    FieldPrompt {
        group: ChatGroup,
        field: ConfigField,
        current: String,
    },
}

pub fn render(ctx: &ScreenContext, settings: &MenuSettings) -> Screen {
    match ctx {
        ScreenContext::MainMenu => main_menu(),
        ScreenContext::JoinedGroups { groups } => joined_groups(groups, settings),
        ScreenContext::JoinedGroupDetail { group } => joined_group_detail(group),
        ScreenContext::AdminGroups { groups } => admin_groups(groups, settings),
        ScreenContext::AddAdminGroup => add_admin_group(),
        ScreenContext::GroupConfig {
            group,
            odds,
            notice,
        } => group_config(group, odds.as_ref(), notice.as_deref()),
        ScreenContext::GameplaySelector { group } => gameplay_selector(group),
        ScreenContext::FieldPrompt {
            group,
            field,
            current,
        } => field_prompt(group, *field, current, settings),
    }
}

fn back(action: Action) -> Vec<Button> {
    vec![Button::to("⬅️ Back", action)]
}

fn back_to_config(group: &ChatGroup) -> Vec<Button> {
    vec![Button::with(
        "⬅️ Back",
        Action::ChatGroupConfig,
        CallbackParams::group(&group.id),
    )]
}

fn truncate_label(s: &str, max_len: usize) -> String {
    if s.chars().count() > max_len {
        format!("{}...", s.chars().take(max_len).collect::<String>())
    } else {
        s.to_string()
    }
}

fn field_name(field: ConfigField) -> &'static str {
    match field {
        ConfigField::DrawCycle => "draw cycle (minutes)",
        ConfigField::SimpleOdds => "simple odds",
        ConfigField::TripletOdds => "triplet odds",
    }
}

fn main_menu() -> Screen {
    Screen {
        text: "🎲 Welcome! What would you like to do?".to_string(),
        rows: vec![vec![
            Button::to("👨🏻‍💼 Groups I joined", Action::JoinedGroup),
            Button::to("👮🏻‍♂️ Groups I manage", Action::AdminGroup),
        ]],
    }
}

fn joined_groups(groups: &[ChatGroup], settings: &MenuSettings) -> Screen {
    if groups.is_empty() {
        return Screen {
            text: "You haven't joined any groups yet!".to_string(),
            rows: vec![back(Action::MainMenu)],
        };
    }

    let mut rows: Vec<Vec<Button>> = groups
        .iter()
        .map(|g| {
            vec![Button::with(
                format!("👥 {}", truncate_label(&g.title, settings.button_label_max_length)),
                Action::JoinedGroupDetail,
                CallbackParams::group(&g.id),
            )]
        })
        .collect();
    rows.push(back(Action::MainMenu));

    Screen {
        text: format!("You have joined {} group(s):", groups.len()),
        rows,
    }
}

fn joined_group_detail(group: &ChatGroup) -> Screen {
    Screen {
        text: format!(
            "👥 {}\n🛠️ Game: {}\n🕹️ Status: {}\n⏲️ Draw cycle: {} min",
            group.title,
            group.gameplay_type.display_name(),
            group.gameplay_status.display_name(),
            group.draw_cycle
        ),
        rows: vec![back(Action::JoinedGroup)],
    }
}

fn admin_groups(groups: &[ChatGroup], settings: &MenuSettings) -> Screen {
    let add = vec![Button::to("➕ Add a new group", Action::AddAdminGroup)];

    if groups.is_empty() {
        return Screen {
            text: "You don't manage any groups yet!".to_string(),
            rows: vec![add, back(Action::MainMenu)],
        };
    }

    let mut rows = vec![add];
    rows.extend(groups.iter().map(|g| {
        vec![Button::with(
            format!("👥 {}", truncate_label(&g.title, settings.button_label_max_length)),
            Action::ChatGroupConfig,
            CallbackParams::group(&g.id),
        )]
    }));
    rows.push(back(Action::MainMenu));

    Screen {
        text: format!("You manage {} group(s):", groups.len()),
        rows,
    }
}

fn add_admin_group() -> Screen {
    Screen {
        text: "To manage a group:\n\
               1. Add this bot to the group and make it an admin.\n\
               2. Send /start in the group.\n\
               The group then appears under \"Groups I manage\"."
            .to_string(),
        rows: vec![back(Action::AdminGroup)],
    }
}

fn group_config(group: &ChatGroup, odds: Option<&QuickThereConfig>, notice: Option<&str>) -> Screen {
    let subject = CallbackParams::group(&group.id);
    let edit = |field| CallbackParams::GroupFieldEdit {
        group_id: group.id.clone(),
        field,
    };

    let mut rows = vec![
        vec![Button::with(
            format!("🛠️ Game: 【{}】", group.gameplay_type.display_name()),
            Action::GameplayType,
            subject.clone(),
        )],
        vec![
            Button::with(
                format!("🕹️ Status: {}", group.gameplay_status.display_name()),
                Action::UpdateGameplayStatus,
                subject,
            ),
            Button::with(
                format!("⏲️ Draw cycle: {} min", group.draw_cycle),
                Action::UpdateGameDrawCycle,
                edit(ConfigField::DrawCycle),
            ),
        ],
    ];

    if let (true, Some(odds)) = (group.gameplay_type.has_odds(), odds) {
        rows.push(vec![Button::with(
            format!("⚖️ Simple odds: {}x", odds.simple_odds),
            Action::SimpleOddsUpdate,
            edit(ConfigField::SimpleOdds),
        )]);
        rows.push(vec![Button::with(
            format!("⚖️ Triplet odds: {}x", odds.triplet_odds),
            Action::TripletOddsUpdate,
            edit(ConfigField::TripletOdds),
        )]);
    }

    rows.push(back(Action::AdminGroup));

    let mut text = format!("👥 {}\n⚙️ Group configuration", group.title);
    if let Some(notice) = notice {
        text = format!("{notice}\n\n{text}");
    }
    Screen { text, rows }
}

fn gameplay_selector(group: &ChatGroup) -> Screen {
    let mut rows: Vec<Vec<Button>> = GameplayType::ALL
        .into_iter()
        .map(|t| {
            let mut label = t.display_name().to_string();
            if t == group.gameplay_type {
                label.push('✅');
            }
            vec![Button::with(
                label,
                Action::UpdateGameplayType,
                CallbackParams::GroupTypeChoice {
                    group_id: group.id.clone(),
                    gameplay_type: t,
                },
            )]
        })
        .collect();
    rows.push(back_to_config(group));

    Screen {
        text: format!("🛠️ Choose the game for {}:", group.title),
        rows,
    }
}

fn field_prompt(
    group: &ChatGroup,
    field: ConfigField,
    current: &str,
    settings: &MenuSettings,
) -> Screen {
    let bounds = match field {
        ConfigField::DrawCycle => format!("1 to {}", settings.max_draw_cycle),
        ConfigField::SimpleOdds | ConfigField::TripletOdds => {
            format!("above 0, at most {}", settings.max_odds)
        }
    };
    Screen {
        text: format!(
            "✏️ Send the new {} for {} ({bounds}).\nCurrent value: {current}",
            field_name(field),
            group.title
        ),
        rows: vec![back_to_config(group)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChatGroupStatus, GameplayStatus, GroupId};

    fn group(t: GameplayType) -> ChatGroup {
        ChatGroup {
            id: GroupId("g1".to_string()),
            tg_chat_id: -1,
            title: "Lucky Dice Club".to_string(),
            gameplay_type: t,
            gameplay_status: GameplayStatus::On,
            draw_cycle: 3,
            status: ChatGroupStatus::Normal,
        }
    }

    const ODDS: QuickThereConfig = QuickThereConfig {
        simple_odds: 1.95,
        triplet_odds: 30.0,
    };

    #[test]
    fn config_screen_adds_two_odds_rows_only_for_quick_there() {
        let quick = group_config(&group(GameplayType::QuickThere), Some(&ODDS), None);
        let other = group_config(&group(GameplayType::BigSmall), Some(&ODDS), None);
        assert_eq!(quick.rows.len(), other.rows.len() + 2);
        assert_eq!(quick.rows[2][0].label, "⚖️ Simple odds: 1.95x");
        assert_eq!(quick.rows[3][0].label, "⚖️ Triplet odds: 30x");
        assert!(other
            .rows
            .iter()
            .flatten()
            .all(|b| !matches!(b.action, Action::SimpleOddsUpdate | Action::TripletOddsUpdate)));
    }

    #[test]
    fn selector_marks_the_active_type_and_carries_both_values() {
        let s = gameplay_selector(&group(GameplayType::BigSmall));
        assert_eq!(s.rows.len(), GameplayType::ALL.len() + 1);
        assert_eq!(s.rows[1][0].label, "Big / Small✅");
        assert_eq!(s.rows[0][0].label, "Quick Three");
        assert_eq!(
            s.rows[0][0].params,
            Some(CallbackParams::GroupTypeChoice {
                group_id: GroupId("g1".to_string()),
                gameplay_type: GameplayType::QuickThere
            })
        );
        assert_eq!(s.rows[2][0].action, Action::ChatGroupConfig);
    }

    #[test]
    fn list_rows_keep_collaborator_order_and_truncate_titles() {
        let mut a = group(GameplayType::QuickThere);
        a.title = "Zeta".to_string();
        let mut b = group(GameplayType::QuickThere);
        b.id = GroupId("g2".to_string());
        b.title = "An extremely long group title that will not fit".to_string();

        let settings = MenuSettings {
            button_label_max_length: 10,
            ..MenuSettings::default()
        };
        let s = admin_groups(&[a, b], &settings);
        assert_eq!(s.rows[1][0].label, "👥 Zeta");
        assert_eq!(s.rows[2][0].label, "👥 An extreme...");
    }

    #[test]
    fn notice_is_prepended_to_config_text() {
        let s = group_config(
            &group(GameplayType::BigSmall),
            None,
            Some("✅ Status set to On"),
        );
        assert!(s.text.starts_with("✅ Status set to On\n\n👥 Lucky Dice Club"));
    }
}
