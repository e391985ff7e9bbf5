use std::io::Cursor;

use dungeon_agent_core::{
    Action, Item,
    agent::{Agent, DungeonAgent},
    config::AgentConfig,
    environment::{ActionResult, Environment, load_environment_from_string},
    protocol::{encode_viewport, read_viewport, write_action},
    view::Viewport,
};

/// Wraps the agent and records every action it takes.
struct Recorder {
    agent: DungeonAgent,
    actions: Vec<Action>,
}

impl Agent for Recorder {
    fn get_action(&mut self, viewport: &Viewport) -> Action {
        let action = self.agent.get_action(viewport);
        self.actions.push(action);
        action
    }
}

fn play(map: &str, max_turns: usize) -> (ActionResult, Recorder, Environment) {
    let mut env = load_environment_from_string(map).unwrap();
    let config = AgentConfig {
        initial_facing: env.facing(),
        ..AgentConfig::default()
    };
    let mut recorder = Recorder {
        agent: DungeonAgent::new(config),
        actions: Vec::new(),
    };
    let result = env.run(&mut recorder, max_turns);
    (result, recorder, env)
}

fn count(actions: &[Action], action: Action) -> usize {
    actions.iter().filter(|a| **a == action).count()
}

#[test]
fn finds_gold_in_an_open_room_and_returns() {
    let map = "\
~~~~~~~
~>    ~
~     ~
~   g ~
~~~~~~~";
    let (result, recorder, env) = play(map, 300);
    assert_eq!(result, ActionResult::Win);
    assert!(recorder.agent.is_done());
    assert_eq!(env.position(), env.start());
    assert_eq!(count(&recorder.actions, Action::Blast), 0);
}

#[test]
fn blasts_one_wall_with_the_only_dynamite() {
    let map = "\
~~~~~~~~~
~d> *  g~
~~~~~~~~~";
    let (result, recorder, env) = play(map, 300);
    assert_eq!(result, ActionResult::Win);
    assert_eq!(count(&recorder.actions, Action::Blast), 1);
    assert_eq!(env.inventory().get(Item::Dynamite), 0);
    assert_eq!(recorder.agent.inventory().get(Item::Dynamite), 0);
}

#[test]
fn chops_through_a_tree_once_the_axe_is_found() {
    let map = "\
~~~~~~~
~a>T g~
~~~~~~~";
    let (result, recorder, _) = play(map, 300);
    assert_eq!(result, ActionResult::Win);
    assert_eq!(count(&recorder.actions, Action::Chop), 1);
    assert_eq!(count(&recorder.actions, Action::Blast), 0);
}

#[test]
fn unlocks_a_door_with_the_key() {
    let map = "\
~~~~~~~~
~k v   ~
~~~-~~~~
~~ g ~~~
~~~~~~~~";
    let (result, recorder, _) = play(map, 400);
    assert_eq!(result, ActionResult::Win);
    assert_eq!(count(&recorder.actions, Action::Open), 1);
}

#[test]
fn never_walks_into_water() {
    let map = "\
~~~~~~~~~
~  ~~~  ~
~ ^~g~  ~
~       ~
~~~~~~~~~";
    let (result, _, env) = play(map, 400);
    assert_eq!(result, ActionResult::Win);
    assert!(env.inventory().has(Item::Gold));
}

#[test]
fn plays_over_the_byte_protocol() {
    let mut env = load_environment_from_string("~~~~~\n~> g~\n~~~~~").unwrap();
    let mut agent = DungeonAgent::new(AgentConfig::default());
    let mut result = ActionResult::Success;
    for _ in 0..100 {
        let mut incoming = Cursor::new(encode_viewport(&env.viewport()).to_vec());
        let view = read_viewport(&mut incoming).unwrap();
        let mut outgoing = Vec::new();
        write_action(&mut outgoing, agent.step(&view)).unwrap();
        assert_eq!(outgoing.len(), 1);
        result = env.process_action(Action::from_byte_lenient(outgoing[0]));
        if result.is_terminal() {
            break;
        }
    }
    assert_eq!(result, ActionResult::Win);
    assert!(agent.is_done());
}
