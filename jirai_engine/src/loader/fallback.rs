//! Built-in content used when the data tables cannot be loaded.
//!
//! The set is small but complete: every stage scene, the reward scenes the
//! default clear rules point at, the true ending and the reward clip catalog.

use crate::puzzle::Difficulty;
use crate::script::{DialogueLine, LineAction, SceneScript};
use crate::trigger::{Ending, TriggerAction, TriggerKind, TriggerRule};
use crate::video::VideoClip;

const HEROINE: &str = "Ami";
const SYSTEM: &str = "system";

/// Clear rules for the three stages.
pub fn default_rules() -> Vec<TriggerRule> {
    vec![
        TriggerRule::on_outcome(
            "default_easy_clear",
            "meeting_game",
            TriggerKind::GameClear(Difficulty::Easy),
            TriggerAction::ChangeScene("easy_reward".into()),
            Some("white_flash"),
        ),
        TriggerRule::on_outcome(
            "default_normal_clear",
            "dinner_game",
            TriggerKind::GameClear(Difficulty::Normal),
            TriggerAction::ChangeScene("normal_reward".into()),
            Some("pink_flash"),
        ),
        TriggerRule::on_outcome(
            "default_hard_clear",
            "home_game",
            TriggerKind::GameClear(Difficulty::Hard),
            TriggerAction::ChangeScene("hard_reward".into()),
            Some("fade"),
        ),
    ]
}

fn ami(text: &str, emotion: &str) -> DialogueLine {
    DialogueLine::new(HEROINE, text, emotion)
}

fn system(text: &str, action: LineAction) -> DialogueLine {
    DialogueLine::new(SYSTEM, text, "").with_action(action)
}

fn scene(id: &str, lines: Vec<DialogueLine>) -> SceneScript {
    SceneScript {
        id: id.to_string(),
        lines,
    }
}

/// Story scenes, one per stage plus rewards and the true ending.
pub fn fallback_scenes() -> Vec<SceneScript> {
    vec![
        scene(
            "meeting",
            vec![
                ami("You're late! I've been waiting forever~", "smile"),
                ami("...Why are you five minutes late?", "irritated"),
                ami("Don't you care about me at all?", "angry"),
                system("Ami is in a bad mood! Dodge the landmines to win her back!", LineAction::StartGame),
            ],
        ),
        scene(
            "easy_reward",
            vec![
                ami("Hmph. Fine, you're forgiven. This time.", "pout"),
                ami("Come on, I booked us a table for dinner.", "smile"),
                system("Ami's mood recovered. On to dinner.", LineAction::NextStage),
            ],
        ),
        scene(
            "dinner_scene",
            vec![
                ami("See? You really do pay attention to me!", "happy"),
                ami("I've wanted to come to this place for ages!", "smile"),
                ami("...Have you been looking at other girls this whole time?", "dark"),
                system("Ami's expression suddenly changes!", LineAction::StartGame),
            ],
        ),
        scene(
            "normal_reward",
            vec![
                ami("Sorry... I guess I imagined it.", "relief"),
                ami("Hey, want to come over to my place?", "sweet"),
                system("Ami takes your hand and leads you home.", LineAction::NextStage),
            ],
        ),
        scene(
            "home_scene",
            vec![
                ami("I'm sorry, I got the wrong idea...", "relief"),
                ami("First time in my room, right? Nervous?", "sweet"),
                ami("Hey... only look at me. Don't look at anyone else.", "yandere"),
                system("Ami has gone yandere! This is the final trial!", LineAction::StartGame),
            ],
        ),
        scene(
            "hard_reward",
            vec![
                ami("You stayed. Even after all that.", "love"),
                system("The night grows quiet.", LineAction::NextStage),
            ],
        ),
        scene(
            Ending::True.key(),
            vec![
                ami("I love you... let's stay together forever~", "love"),
                ami("Good morning~ Yesterday was fun, wasn't it?", "happy"),
                ami("We'll always be together from now on... right?", "sweet"),
                system("TRUE END - You made it safely to morning", LineAction::ShowEnding),
            ],
        ),
    ]
}

fn clip(id: &str, title: &str, file: &str, duration: f64, next: Option<&str>, category: &str) -> VideoClip {
    VideoClip {
        id: id.to_string(),
        title: title.to_string(),
        path: format!("assets/videos/{file}"),
        duration_hint: duration,
        next_id: next.map(str::to_string),
        category: category.to_string(),
        age_gated: true,
    }
}

/// Reward clip catalog. The normal and hard chains point at clips that are not
/// shipped, so they end early.
pub fn fallback_videos() -> Vec<VideoClip> {
    vec![
        clip("easy_reward_intro", "Easy - Intro", "easy_intro.mp4", 10.0, Some("easy_reward_main"), "reward"),
        clip("easy_reward_main", "Easy - Main", "easy_main.mp4", 30.0, Some("easy_reward_climax"), "reward"),
        clip("easy_reward_climax", "Easy - Climax", "easy_climax.mp4", 15.0, Some("easy_reward_after"), "reward"),
        clip("easy_reward_after", "Easy - After", "easy_after.mp4", 20.0, None, "reward"),
        clip("normal_reward_intro", "Normal - Intro", "normal_intro.mp4", 12.0, Some("normal_reward_main"), "reward"),
        clip("normal_reward_main", "Normal - Main", "normal_main.mp4", 35.0, Some("normal_reward_climax"), "reward"),
        clip("hard_reward_intro", "Hard - Intro", "hard_intro.mp4", 15.0, Some("hard_reward_main"), "reward"),
        clip("true_ending_special", "TRUE END Special", "true_end_special.mp4", 60.0, None, "special"),
    ]
}
